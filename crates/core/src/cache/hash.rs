//! Content-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute the shared-cache key for an exact request.
///
/// Two requests share a key only when method, URL and the `Accept`
/// header all match.
pub fn compute_request_key(method: &str, url: &str, accept: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(accept.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_request_key("GET", "https://example.com", "");
        let hash2 = compute_request_key("get", "https://example.com", "");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_method() {
        let get = compute_request_key("GET", "https://example.com", "");
        let head = compute_request_key("HEAD", "https://example.com", "");
        assert_ne!(get, head);
    }

    #[test]
    fn test_hash_different_accept() {
        let hash1 = compute_request_key("GET", "https://example.com", "text/html");
        let hash2 = compute_request_key("GET", "https://example.com", "image/webp");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_request_key("GET", "https://example.com", "");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
