use crate::extract::{field_names, DetailFields};
use crate::listing::ListingStatus;
use crate::url::{canonicalize, listing_id_from_url};
use crate::UrlError;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identity of a listing: the last path segment of its canonical URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListingId(String);

impl ListingId {
    /// Derives the id from a detail-page URL
    pub fn from_url(url: &str) -> Result<Self, UrlError> {
        listing_id_from_url(url).map(Self)
    }

    /// Wraps an id read back from storage
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A coerced field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Int(n) => Value::from(*n),
            Self::Float(f) => Value::from(*f),
            Self::Bool(b) => Value::Bool(*b),
        }
    }
}

/// A single advert, built from its listing-page card and completed from its detail page
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: ListingId,
    /// Canonical detail URL
    pub url: String,
    /// Seed whose traversal discovered the listing
    pub seed: String,
    status: ListingStatus,
    pub fields: BTreeMap<String, FieldValue>,
    /// Raw feature tags from the listing card
    pub features: Vec<String>,
    /// Every label → value pair found on the detail page
    pub characteristics: BTreeMap<String, String>,
    pub scraped_at: DateTime<Utc>,
}

impl Listing {
    /// Creates a Preview listing for a detail URL
    pub fn preview(url: &str, seed: &str) -> Result<Self, UrlError> {
        let canonical = canonicalize(url)?;
        let id = ListingId::from_url(canonical.as_str())?;

        Ok(Self {
            id,
            url: canonical.to_string(),
            seed: seed.to_string(),
            status: ListingStatus::Preview,
            fields: BTreeMap::new(),
            features: Vec::new(),
            characteristics: BTreeMap::new(),
            scraped_at: Utc::now(),
        })
    }

    pub fn status(&self) -> ListingStatus {
        self.status
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Sets a field; `None` leaves any existing value in place
    pub fn set_field(&mut self, name: &str, value: Option<FieldValue>) {
        if let Some(value) = value {
            self.fields.insert(name.to_string(), value);
        }
    }

    /// Merges detail-page fields over the preview and marks the listing Complete
    ///
    /// Returns false (and changes nothing) if the listing already left Preview.
    pub fn merge_detail(&mut self, detail: DetailFields) -> bool {
        if !self.transition(ListingStatus::Complete) {
            return false;
        }
        self.fields.extend(detail.fields);
        self.characteristics.extend(detail.characteristics);
        self.scraped_at = Utc::now();
        true
    }

    /// Marks the listing as a degraded, preview-only record
    pub fn mark_preview_only(&mut self) -> bool {
        self.transition(ListingStatus::PreviewOnly)
    }

    fn transition(&mut self, next: ListingStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// Flattens the listing into the key → value map handed to record stores
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("id".to_string(), Value::String(self.id.to_string()));
        record.insert("url".to_string(), Value::String(self.url.clone()));
        record.insert("seed".to_string(), Value::String(self.seed.clone()));
        record.insert(
            "status".to_string(),
            Value::String(self.status.to_db_string().to_string()),
        );
        record.insert(
            "scraped_at".to_string(),
            Value::String(self.scraped_at.to_rfc3339()),
        );
        record.insert(
            "features".to_string(),
            Value::Array(self.features.iter().cloned().map(Value::String).collect()),
        );

        for name in field_names() {
            let value = self.fields.get(name).map_or(Value::Null, FieldValue::to_json);
            record.insert(name.to_string(), value);
        }

        for (label, value) in &self.characteristics {
            record.insert(
                format!("characteristic.{}", label),
                Value::String(value.clone()),
            );
        }

        record
    }

    /// Content fingerprint of the flat record, ignoring the scrape time
    pub fn fingerprint(&self) -> String {
        fingerprint_record(&self.to_record())
    }
}

/// SHA-256 over the key-sorted record without `scraped_at`
pub fn fingerprint_record(record: &Map<String, Value>) -> String {
    let canonical: BTreeMap<&String, &Value> = record
        .iter()
        .filter(|(key, _)| key.as_str() != "scraped_at")
        .collect();
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}
