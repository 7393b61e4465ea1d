//! Listing-page extraction: result cards and the next-page link

use crate::extract::coerce::{clean_text, coerce};
use crate::extract::fields::{classify_feature, kind_of, FieldKind};
use crate::extract::page::parse_document;
use crate::extract::{ParseError, SiteProfile};
use crate::listing::{FieldValue, Listing};
use crate::url::resolve_link;
use scraper::ElementRef;
use url::Url;

/// Everything read off one listing page
#[derive(Debug, Default)]
pub struct ListingPage {
    /// Preview listings, in page order
    pub listings: Vec<Listing>,
    /// Absolute URL of the next results page, if any
    pub next_page: Option<Url>,
    /// Cards without a usable detail link
    pub skipped_cards: usize,
}

/// Extracts preview listings and the next-page link from a listing page
pub fn extract_listing_page(
    profile: &SiteProfile,
    body: &str,
    page_url: &Url,
    seed: &str,
) -> Result<ListingPage, ParseError> {
    let document = parse_document(body, page_url.as_str())?;
    let root = document.root_element();
    let mut page = ListingPage::default();

    for card in profile.result_card.select_all(root) {
        match extract_card(profile, card, page_url, seed) {
            Some(listing) => page.listings.push(listing),
            None => {
                tracing::warn!("Skipping result card without detail link on {}", page_url);
                page.skipped_cards += 1;
            }
        }
    }

    page.next_page = profile
        .next_page
        .extract(root)
        .and_then(|href| resolve_link(&href, page_url));

    tracing::debug!(
        "Extracted {} cards from {} (next page: {})",
        page.listings.len(),
        page_url,
        page.next_page.is_some()
    );

    Ok(page)
}

fn extract_card(
    profile: &SiteProfile,
    card: ElementRef<'_>,
    page_url: &Url,
    seed: &str,
) -> Option<Listing> {
    let href = profile.card_link.extract(card)?;
    let detail_url = resolve_link(&href, page_url)?;
    let mut listing = Listing::preview(detail_url.as_str(), seed).ok()?;

    listing.set_field(
        "title",
        profile.card_title.extract(card).map(FieldValue::Text),
    );
    listing.set_field(
        "price",
        profile
            .card_price
            .extract(card)
            .and_then(|raw| coerce(FieldKind::Number, &raw)),
    );
    listing.set_field(
        "image",
        profile
            .card_image
            .extract(card)
            .and_then(|src| resolve_link(&src, page_url))
            .map(|url| FieldValue::Text(url.to_string())),
    );

    for element in profile.card_features.select_all(card) {
        let Some(tag) = clean_text(&element.text().collect::<String>()) else {
            continue;
        };
        apply_feature_tag(&mut listing, &tag);
        listing.features.push(tag);
    }

    Some(listing)
}

/// Classifies a feature tag and stores its coerced value; earlier tags win
fn apply_feature_tag(listing: &mut Listing, tag: &str) {
    let Some(field) = classify_feature(tag) else {
        return;
    };
    if listing.field(field).is_some() {
        return;
    }
    if let Some(kind) = kind_of(field) {
        listing.set_field(field, coerce(kind, tag));
    }
}
