use crate::UrlError;
use url::Url;

/// Normalizes a URL into a stable cache key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything but http and https
/// 3. Lowercase the host (the `url` crate already does this for special schemes)
/// 4. Remove the fragment
/// 5. Remove an empty query string
///
/// Path case and trailing slashes are kept since the catalog server treats them
/// as significant.
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::normalize_url;
///
/// let url = normalize_url("https://WWW.UNISA.AC.ZA/Modules/ABC1501?#top").unwrap();
/// assert_eq!(url.as_str(), "https://www.unisa.ac.za/Modules/ABC1501");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

/// Parses the configured site host into a base URL for joining hrefs
pub fn parse_host(host: &str) -> Result<Url, UrlError> {
    normalize_url(host)
}
