//! URL handling module for Catalog-Harvest
//!
//! Hrefs scraped from catalog pages are mostly site-relative; this module
//! resolves them against the configured host and produces stable cache keys.

mod normalize;

pub use normalize::{normalize_url, parse_host};

use url::Url;

/// Resolves an href against the site host
///
/// Returns None if the link should be excluded:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel: and data: schemes
/// - hrefs that do not resolve to an http(s) URL
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::resolve_href;
/// use url::Url;
///
/// let host = Url::parse("https://www.unisa.ac.za").unwrap();
/// let url = resolve_href(&host, "/modules/ABC1501#top").unwrap();
/// assert_eq!(url.as_str(), "https://www.unisa.ac.za/modules/ABC1501");
/// ```
pub fn resolve_href(host: &Url, href: &str) -> Option<Url> {
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

    let mut absolute = host.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}

/// Returns true if an href points below the catalog index path
///
/// The index page itself does not count as a qualification link.
pub fn is_catalog_link(href: &str, catalog_path: &str) -> bool {
    let href = href.trim();
    href.starts_with(catalog_path) && href != catalog_path
}
