//! Detail-page extraction
//!
//! Most detail fields sit on a property sheet as label/value pairs. Every
//! pair is collected once into the characteristics map, and named fields are
//! then looked up by their label synonyms. Headline features tagged with an
//! `aria-label` take precedence over the sheet.

use crate::extract::coerce::{clean_text, coerce};
use crate::extract::fields::{FieldKind, LABELED_FIELDS};
use crate::extract::page::parse_document;
use crate::extract::{ParseError, SiteProfile};
use crate::listing::FieldValue;
use scraper::ElementRef;
use std::collections::BTreeMap;

/// Fields read from one detail page, ready to merge into a listing
#[derive(Debug, Clone, Default)]
pub struct DetailFields {
    pub fields: BTreeMap<String, FieldValue>,
    pub characteristics: BTreeMap<String, String>,
}

impl DetailFields {
    fn set_if_absent(&mut self, name: &str, value: Option<FieldValue>) {
        if let Some(value) = value {
            self.fields.entry(name.to_string()).or_insert(value);
        }
    }
}

/// Extracts the detail field set from a detail page body
pub fn extract_detail(
    profile: &SiteProfile,
    body: &str,
    url: &str,
) -> Result<DetailFields, ParseError> {
    let document = parse_document(body, url)?;
    let root = document.root_element();
    let mut detail = DetailFields::default();

    for (label, value) in label_pairs(profile, root) {
        detail.characteristics.entry(label).or_insert(value);
    }

    for item in root.select(&profile.main_features) {
        let Some(aria) = item.value().attr("aria-label") else {
            continue;
        };
        let Some(text) = clean_text(&item.text().collect::<String>()) else {
            continue;
        };
        if let Some((field, kind)) = main_feature_field(aria) {
            detail.set_if_absent(field, coerce(kind, &text));
        }
    }

    for spec in LABELED_FIELDS {
        let raw = spec
            .labels
            .iter()
            .find_map(|label| detail.characteristics.get(*label).cloned());
        if let Some(raw) = raw {
            detail.set_if_absent(spec.name, coerce(spec.kind, &raw));
        }
    }

    let structural = [
        ("title", FieldKind::Text, &profile.detail_title),
        ("description", FieldKind::Text, &profile.description),
        ("latitude", FieldKind::Coordinate, &profile.latitude),
        ("longitude", FieldKind::Coordinate, &profile.longitude),
        ("agency_name", FieldKind::Text, &profile.agency_name),
    ];
    for (name, kind, chain) in structural {
        detail.set_if_absent(name, chain.extract(root).and_then(|raw| coerce(kind, &raw)));
    }

    tracing::debug!(
        "Extracted {} fields and {} characteristics from {}",
        detail.fields.len(),
        detail.characteristics.len(),
        url
    );

    Ok(detail)
}

/// Collects label → value pairs: each label node paired with its next sibling element
fn label_pairs(profile: &SiteProfile, root: ElementRef<'_>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for selector in &profile.property_labels {
        for label_node in root.select(selector) {
            let Some(label) = clean_text(&label_node.text().collect::<String>()) else {
                continue;
            };
            let value = label_node
                .next_siblings()
                .find_map(ElementRef::wrap)
                .and_then(|node| clean_text(&node.text().collect::<String>()));
            if let Some(value) = value {
                pairs.push((label, value));
            }
        }
    }
    pairs
}

/// Maps a headline feature's aria-label to its field
fn main_feature_field(aria_label: &str) -> Option<(&'static str, FieldKind)> {
    let label = aria_label.trim().to_lowercase();
    match label.as_str() {
        "piano" => Some(("floor", FieldKind::Floor)),
        "superficie" => Some(("surface", FieldKind::Number)),
        "locali" => Some(("rooms", FieldKind::Number)),
        l if l.starts_with("bagn") => Some(("bathrooms", FieldKind::Number)),
        _ => None,
    }
}
