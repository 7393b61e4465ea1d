//! Lifecycle states of a listing within one run
//!
//! A listing starts as `Preview` when its card is read off a listing page.
//! It ends either `Complete` (detail fields merged in) or `PreviewOnly`
//! (the detail fetch failed permanently).

use std::fmt;

/// Represents where a listing is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingStatus {
    /// Only the listing-page card fields are known
    Preview,

    /// Detail fields have been merged in
    Complete,

    /// Detail fetch failed; the preview is kept as a degraded record
    PreviewOnly,
}

impl ListingStatus {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Preview)
    }

    /// Returns true if the status represents a degraded record
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::PreviewOnly)
    }

    /// Returns true if moving from this status to `next` is allowed
    pub fn can_transition_to(&self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Preview, Self::Complete) | (Self::Preview, Self::PreviewOnly)
        )
    }

    /// Converts the status to its stored string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Complete => "complete",
            Self::PreviewOnly => "preview_only",
        }
    }

    /// Parses a status from its stored string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "preview" => Some(Self::Preview),
            "complete" => Some(Self::Complete),
            "preview_only" => Some(Self::PreviewOnly),
            _ => None,
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
