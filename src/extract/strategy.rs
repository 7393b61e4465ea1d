//! Ordered selector strategies
//!
//! A field is read through a `FieldChain`: a list of strategies tried in
//! order, where the first one producing a non-empty value wins. A field no
//! strategy matches is simply absent.

use crate::extract::coerce::clean_text;
use crate::ConfigError;
use scraper::{ElementRef, Selector};

/// Compiles a CSS selector, naming the profile slot on failure
pub(crate) fn compile_selector(slot: &str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|_| ConfigError::InvalidSelector {
        slot: slot.to_string(),
        selector: css.to_string(),
    })
}

/// One way of reading a value out of a scope element
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Whitespace-collapsed text of the first match with non-empty text
    Text(Selector),
    /// Attribute of the first match that carries a non-empty value
    Attr(Selector, &'static str),
}

impl Strategy {
    pub fn text(slot: &str, css: &str) -> Result<Self, ConfigError> {
        Ok(Self::Text(compile_selector(slot, css)?))
    }

    pub fn attr(slot: &str, css: &str, name: &'static str) -> Result<Self, ConfigError> {
        Ok(Self::Attr(compile_selector(slot, css)?, name))
    }

    /// Applies the strategy to the descendants of `scope`
    pub fn apply(&self, scope: ElementRef<'_>) -> Option<String> {
        match self {
            Self::Text(selector) => scope
                .select(selector)
                .find_map(|el| clean_text(&el.text().collect::<String>())),
            Self::Attr(selector, name) => scope
                .select(selector)
                .find_map(|el| el.value().attr(name).and_then(clean_text)),
        }
    }
}

/// Ordered fallback chain for one field
#[derive(Debug, Clone, Default)]
pub struct FieldChain {
    strategies: Vec<Strategy>,
}

impl FieldChain {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    /// Returns the first non-empty value any strategy produces
    pub fn extract(&self, scope: ElementRef<'_>) -> Option<String> {
        self.strategies.iter().find_map(|s| s.apply(scope))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Ordered fallback chain for a node list (result cards, feature tags)
///
/// The first selector that matches anything provides the whole list.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    pub fn compile<S: AsRef<str>>(slot: &str, css: &[S]) -> Result<Self, ConfigError> {
        let selectors = css
            .iter()
            .map(|s| compile_selector(slot, s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }

    pub fn select_all<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.selectors
            .iter()
            .map(|selector| scope.select(selector).collect::<Vec<_>>())
            .find(|matches| !matches.is_empty())
            .unwrap_or_default()
    }
}
