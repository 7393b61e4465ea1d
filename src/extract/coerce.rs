//! Post-extraction type coercion
//!
//! Selectors only ever produce raw strings. These functions turn them into
//! typed values and fail open to `None` whenever the text is ambiguous.

use crate::extract::fields::FieldKind;
use crate::listing::FieldValue;

const THOUSANDS_SEPARATORS: [char; 5] = ['.', ',', '\u{a0}', '\u{202f}', '\''];

const AFFIRMATIVE: [&str; 5] = ["sì", "si", "yes", "true", "1"];
const NEGATIVE: [&str; 3] = ["no", "false", "0"];

/// Coerces a raw extracted string according to the field kind
pub fn coerce(kind: FieldKind, raw: &str) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => clean_text(raw).map(FieldValue::Text),
        FieldKind::Number => parse_number(raw).map(FieldValue::Int),
        FieldKind::Floor => parse_floor(raw).map(FieldValue::Int),
        FieldKind::Flag => parse_flag(raw).map(FieldValue::Bool),
        FieldKind::Coordinate => parse_coordinate(raw).map(FieldValue::Float),
    }
}

/// Collapses runs of whitespace to a single space and trims
///
/// ```
/// use immo_harvest::extract::clean_text;
///
/// assert_eq!(clean_text("  Trilocale \n  in   affitto "), Some("Trilocale in affitto".to_string()));
/// assert_eq!(clean_text(" \t\n"), None);
/// ```
pub fn clean_text(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Extracts the first run of digits, skipping thousands separators
///
/// A separator only counts as a thousands separator when exactly three
/// digits follow it, so `"1,5 bagni"` reads as 1 and `"€ 1.250/mese"` as 1250.
///
/// ```
/// use immo_harvest::extract::parse_number;
///
/// assert_eq!(parse_number("€ 350.000"), Some(350_000));
/// assert_eq!(parse_number("85 m²"), Some(85));
/// assert_eq!(parse_number("su richiesta"), None);
/// ```
pub fn parse_number(raw: &str) -> Option<i64> {
    let chars: Vec<char> = raw.chars().collect();
    let start = chars.iter().position(|c| c.is_ascii_digit())?;

    let mut digits = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            digits.push(c);
            i += 1;
        } else if THOUSANDS_SEPARATORS.contains(&c) && is_digit_group(&chars, i + 1) {
            i += 1;
        } else {
            break;
        }
    }

    digits.parse().ok()
}

/// True if exactly three digits start at `from`, followed by a non-digit or the end
fn is_digit_group(chars: &[char], from: usize) -> bool {
    let group_end = from + 3;
    if group_end > chars.len() {
        return false;
    }
    if !chars[from..group_end].iter().all(|c| c.is_ascii_digit()) {
        return false;
    }
    chars.get(group_end).map_or(true, |c| !c.is_ascii_digit())
}

/// Parses a floor description
///
/// - `"seminterrato"` / `"interrato"` → -1
/// - `"piano terra"` / `"rialzato"` / `"T"` → 0
/// - pure digits (optionally prefixed by "piano" or suffixed by "°") → that number
/// - anything else → `None`
///
/// Only the part before the first comma is considered, so
/// `"3, con ascensore"` still reads as 3.
pub fn parse_floor(raw: &str) -> Option<i64> {
    let lowered = clean_text(raw)?.to_lowercase();
    let head = lowered.split(',').next().unwrap_or("").trim();

    // "seminterrato" contains "interrato" and "interrato" contains "terra"
    if head.contains("interrato") {
        return Some(-1);
    }
    if head.contains("terra") || head.contains("rialzato") {
        return Some(0);
    }

    let rest = head
        .replace("piano", "")
        .replace(['°', 'º'], "")
        .trim()
        .to_string();

    if rest == "t" {
        return Some(0);
    }
    if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
        return rest.parse().ok();
    }
    None
}

/// Parses a yes/no answer without guessing
///
/// An affirmative token wins over a negative one; text with neither is `None`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    let lowered = raw.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.iter().any(|t| AFFIRMATIVE.contains(t)) {
        Some(true)
    } else if tokens.iter().any(|t| NEGATIVE.contains(t)) {
        Some(false)
    } else {
        None
    }
}

/// Parses a decimal coordinate, accepting a comma as decimal separator
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
