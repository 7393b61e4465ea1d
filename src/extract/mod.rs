//! Field extraction from listing and detail pages
//!
//! Pages are parsed with `scraper`, and fields are read through ordered
//! selector fallback chains. Raw strings are coerced to typed values after
//! matching. A missing field is never an error; only a body that cannot be
//! a page at all is.
//!
//! Parsed documents never leave this module, so callers only ever hold
//! owned, `Send` results.

mod coerce;
mod detail;
mod fields;
mod page;
mod preview;
mod profile;
mod strategy;

pub use coerce::{clean_text, coerce, parse_coordinate, parse_flag, parse_floor, parse_number};
pub use detail::{extract_detail, DetailFields};
pub use fields::{classify_feature, field_names, kind_of, FieldKind, FieldSpec, LABELED_FIELDS};
pub use page::parse_document;
pub use preview::{extract_listing_page, ListingPage};
pub use profile::SiteProfile;
pub use strategy::{FieldChain, SelectorChain, Strategy};

use thiserror::Error;

/// Page-level extraction failures
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Empty response body from {url}")]
    EmptyBody { url: String },

    #[error("Response from {url} contains no markup")]
    NotMarkup { url: String },
}
