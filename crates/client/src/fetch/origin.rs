//! Request URL resolution and same-origin checks.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target against the site origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Absolute paths (`/...`) are joined onto `origin`; anything else must be
///    an absolute http(s) URL
/// 3. Remove fragment (#...), never sent to the network
/// 4. Keep query string intact (do not reorder)
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let joined = if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        origin.join(trimmed)
    } else if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        return Err(UrlError::InvalidUrl(format!("expected an absolute path or URL: {trimmed}")));
    };
    let mut parsed = joined.map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Scheme, host and port all match.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
