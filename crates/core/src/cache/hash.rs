//! Request-keyed cache key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// URL form used for cache lookups: fragment removed.
pub fn cache_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Compute the cache key for a request (method + URL).
pub fn compute_cache_key(method: &str, url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(cache_url(url).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("GET", &url("https://docs.test/syllabus"));
        let hash2 = compute_cache_key("GET", &url("https://docs.test/syllabus"));
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_ignores_fragment_and_method_case() {
        let plain = compute_cache_key("GET", &url("https://docs.test/faq"));
        let anchored = compute_cache_key("get", &url("https://docs.test/faq#q3"));
        assert_eq!(plain, anchored);
    }

    #[test]
    fn test_hash_different_method() {
        let get = compute_cache_key("GET", &url("https://docs.test/faq"));
        let head = compute_cache_key("HEAD", &url("https://docs.test/faq"));
        assert_ne!(get, head);
    }

    #[test]
    fn test_hash_query_is_significant() {
        let a = compute_cache_key("GET", &url("https://docs.test/search?q=a"));
        let b = compute_cache_key("GET", &url("https://docs.test/search?q=b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", &url("https://docs.test/"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
