//! Content-addressed request identity for tier entries.

use sha2::{Digest, Sha256};

/// Compute the tier key for a request.
///
/// The URL must already be canonical; two requests with the same method and
/// canonical URL always share a key.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_request_key("GET", "https://example.com/animations/sun.json");
        let key2 = compute_request_key("GET", "https://example.com/animations/sun.json");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_method_case_insensitive() {
        assert_eq!(
            compute_request_key("get", "https://example.com/"),
            compute_request_key("GET", "https://example.com/")
        );
    }

    #[test]
    fn test_key_different_query() {
        let a = compute_request_key("GET", "https://api.openweathermap.org/data?lat=1");
        let b = compute_request_key("GET", "https://api.openweathermap.org/data?lat=2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", "https://example.com/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
