//! Request identities
//!
//! An identity is the set of headers that makes a request look like it came
//! from a browser. The rotator draws identities from a preset pool, optionally
//! fed by an external user-agent source.

mod presets;
mod rotator;
mod source;

pub use presets::{ACCEPT_LANGUAGES, USER_AGENTS};
pub use rotator::{IdentityRotator, IdentitySession};
pub use source::{FileUserAgentSource, UserAgentSource};

use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;

/// Identity-related errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("User-agent source {source_name} failed: {reason}")]
    Source { source_name: String, reason: String },

    #[error("Implausible user agent: {0}")]
    Implausible(String),

    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),
}

/// Header bundle for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub accept_language: String,
    pub referer: Option<String>,
    /// Per-request nonce, sent as a query parameter when configured
    pub cache_buster: String,
}

impl Identity {
    pub(crate) fn new_cache_buster() -> String {
        format!("{:016x}", rand::random::<u64>())
    }

    /// Builds the request headers for this identity
    pub fn to_headers(&self) -> Result<HeaderMap, IdentityError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, header_value("user-agent", &self.user_agent)?);
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header_value("accept-language", &self.accept_language)?,
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static(presets::ACCEPT));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        if let Some(referer) = &self.referer {
            headers.insert(header::REFERER, header_value("referer", referer)?);
        }
        Ok(headers)
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, IdentityError> {
    HeaderValue::from_str(value).map_err(|_| IdentityError::InvalidHeader(name))
}
