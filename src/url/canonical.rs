use crate::{UrlError, UrlResult};
use url::Url;

/// Canonicalizes a detail-page URL
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Collapse empty path segments and drop the trailing slash (except root)
/// 4. Remove the query string and fragment
///
/// The result is the stable form a listing is identified by, so the same
/// advert reached through different search pages maps to one record.
///
/// # Examples
///
/// ```
/// use immo_harvest::url::canonicalize;
///
/// let url = canonicalize("https://WWW.Immobiliare.it/annunci/101835256/?ref=list#map").unwrap();
/// assert_eq!(url.as_str(), "https://www.immobiliare.it/annunci/101835256");
/// ```
pub fn canonicalize(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // The url crate lowercases domain hosts already; IP hosts are left as-is
    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    let path = collapse_path(url.path());
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Derives a listing id: the last non-empty path segment of the canonical URL
///
/// ```
/// use immo_harvest::url::listing_id_from_url;
///
/// let id = listing_id_from_url("https://www.immobiliare.it/annunci/101835256/").unwrap();
/// assert_eq!(id, "101835256");
/// ```
pub fn listing_id_from_url(url_str: &str) -> UrlResult<String> {
    let url = canonicalize(url_str)?;
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
        .ok_or_else(|| UrlError::MissingId(url.to_string()))
}

/// Resolves a link href against the page it was found on
///
/// Returns None if the link should be ignored:
/// - empty hrefs and fragment-only anchors
/// - javascript:, mailto:, tel: and data: links
/// - links that do not resolve to an HTTP(S) URL
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute)
        }
        _ => None,
    }
}

/// Drops empty segments and the trailing slash, keeping "/" for the root
fn collapse_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}
