//! Listing records and their lifecycle
//!
//! - `Listing`: one advert with its preview and detail fields
//! - `ListingStatus`: Preview → Complete | PreviewOnly
//! - `ListingId`: identity derived from the canonical detail URL

mod record;
mod status;

pub use record::{fingerprint_record, FieldValue, Listing, ListingId};
pub use status::ListingStatus;
