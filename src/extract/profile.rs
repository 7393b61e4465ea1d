use crate::config::SiteConfig;
use crate::extract::strategy::{compile_selector, FieldChain, SelectorChain, Strategy};
use crate::ConfigError;
use scraper::Selector;

const RESULT_CARD: &[&str] = &[
    "li.in-searchLayoutListItem",
    "li.nd-list__item",
    "[data-listing-id]",
];
const CARD_LINK: &[&str] = &[
    "a.in-listingCardTitle",
    "a.in-card__title",
    "a[href*='/annunci/']",
];
const CARD_TITLE: &[&str] = &["a.in-listingCardTitle", ".in-listingCardTitle", "h2", "h3"];
const CARD_PRICE: &[&str] = &[".in-listingCardPrice span", ".in-listingCardPrice", ".price"];
const CARD_FEATURES: &[&str] = &[
    ".in-listingCardFeatureList__item",
    ".in-feat__item",
    "ul.features li",
];
const CARD_IMAGE: &[&str] = &["img"];
const NEXT_PAGE: &[&str] = &[
    "div[data-cy='pagination-next'] a",
    "a[rel='next']",
    "link[rel='next']",
];

/// Compiled selectors for one listing site
///
/// The structural card and pagination slots can be overridden from the
/// `[site]` configuration section; the detail-page selectors are fixed.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub result_card: SelectorChain,
    pub card_link: FieldChain,
    pub card_title: FieldChain,
    pub card_price: FieldChain,
    pub card_features: SelectorChain,
    pub card_image: FieldChain,
    pub next_page: FieldChain,

    /// Label nodes whose next sibling element holds the value
    pub property_labels: Vec<Selector>,
    /// Headline features tagged with an aria-label naming the field
    pub main_features: Selector,
    pub detail_title: FieldChain,
    pub description: FieldChain,
    pub latitude: FieldChain,
    pub longitude: FieldChain,
    pub agency_name: FieldChain,
}

impl SiteProfile {
    /// Builds the profile, applying any configured overrides
    pub fn from_config(site: &SiteConfig) -> Result<Self, ConfigError> {
        let slot = |value: &Option<Vec<String>>, defaults: &[&str]| -> Vec<String> {
            match value {
                Some(list) if !list.is_empty() => list.clone(),
                _ => defaults.iter().map(|s| s.to_string()).collect(),
            }
        };

        let card_link = slot(&site.card_link, CARD_LINK);
        let card_title = slot(&site.card_title, CARD_TITLE);
        let card_price = slot(&site.card_price, CARD_PRICE);
        let card_image = slot(&site.card_image, CARD_IMAGE);
        let next_page = slot(&site.next_page, NEXT_PAGE);

        Ok(Self {
            result_card: SelectorChain::compile(
                "result-card",
                &slot(&site.result_card, RESULT_CARD),
            )?,
            card_link: attr_chain("card-link", &card_link, &["href"])?,
            card_title: title_chain("card-title", &card_title)?,
            card_price: text_chain("card-price", &card_price)?,
            card_features: SelectorChain::compile(
                "card-features",
                &slot(&site.card_features, CARD_FEATURES),
            )?,
            card_image: attr_chain("card-image", &card_image, &["src", "data-src"])?,
            next_page: attr_chain("next-page", &next_page, &["href"])?,

            property_labels: vec![
                compile_selector("property-label", ".im-properties__title")?,
                compile_selector("property-label", "dt")?,
            ],
            main_features: compile_selector(
                "main-features",
                "ul.in-landingDetail__mainFeatures li[aria-label]",
            )?,
            detail_title: FieldChain::new(vec![
                Strategy::text("detail-title", "h1")?,
                Strategy::attr("detail-title", "meta[property='og:title']", "content")?,
                Strategy::text("detail-title", "title")?,
            ]),
            description: FieldChain::new(vec![
                Strategy::text("description", ".im-description__text")?,
                Strategy::text("description", "[data-testid='description']")?,
                Strategy::attr("description", "meta[name='description']", "content")?,
            ]),
            latitude: FieldChain::new(vec![
                Strategy::attr("latitude", "[data-lat]", "data-lat")?,
                Strategy::attr(
                    "latitude",
                    "meta[property='place:location:latitude']",
                    "content",
                )?,
            ]),
            longitude: FieldChain::new(vec![
                Strategy::attr("longitude", "[data-lng]", "data-lng")?,
                Strategy::attr(
                    "longitude",
                    "meta[property='place:location:longitude']",
                    "content",
                )?,
            ]),
            agency_name: FieldChain::new(vec![
                Strategy::text("agency-name", ".in-referent__name")?,
                Strategy::text("agency-name", "[data-cy='agency-name']")?,
                Strategy::attr("agency-name", ".in-referent img", "alt")?,
            ]),
        })
    }
}

fn text_chain(slot: &str, css: &[String]) -> Result<FieldChain, ConfigError> {
    css.iter()
        .map(|s| Strategy::text(slot, s))
        .collect::<Result<Vec<_>, _>>()
        .map(FieldChain::new)
}

/// The `title` attribute of each selector, falling back to its text
fn title_chain(slot: &str, css: &[String]) -> Result<FieldChain, ConfigError> {
    let mut strategies = Vec::with_capacity(css.len() * 2);
    for s in css {
        strategies.push(Strategy::attr(slot, s, "title")?);
        strategies.push(Strategy::text(slot, s)?);
    }
    Ok(FieldChain::new(strategies))
}

/// One strategy per (selector, attribute) pair, selectors outermost
fn attr_chain(
    slot: &str,
    css: &[String],
    attrs: &[&'static str],
) -> Result<FieldChain, ConfigError> {
    let mut strategies = Vec::with_capacity(css.len() * attrs.len());
    for s in css {
        for attr in attrs {
            strategies.push(Strategy::attr(slot, s, *attr)?);
        }
    }
    Ok(FieldChain::new(strategies))
}
