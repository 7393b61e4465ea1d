use crate::extract::ParseError;
use scraper::Html;

/// Parses a response body into a queryable document
///
/// Only bodies that cannot possibly be a page are rejected: an empty body,
/// or one without any markup. html5ever recovers from everything else.
pub fn parse_document(body: &str, url: &str) -> Result<Html, ParseError> {
    if body.trim().is_empty() {
        return Err(ParseError::EmptyBody {
            url: url.to_string(),
        });
    }

    if !body.contains('<') {
        return Err(ParseError::NotMarkup {
            url: url.to_string(),
        });
    }

    Ok(Html::parse_document(body))
}
