//! URL handling module for Immo-Harvest
//!
//! Canonicalization of detail URLs, listing id derivation, relative link
//! resolution and allowed-host matching.

mod canonical;
mod scope;

pub use canonical::{canonicalize, listing_id_from_url, resolve_link};
pub use scope::{matches_wildcard, HostScope};
