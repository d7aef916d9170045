//! Content digests for checkpoint payloads.

use sha2::{Digest, Sha256};

pub fn content_digest(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_stability() {
        assert_eq!(content_digest(b"model"), content_digest(b"model"));
        assert_eq!(content_digest(b"").len(), 64);
    }

    #[test]
    fn digest_differs_for_different_payloads() {
        assert_ne!(content_digest(b"demand"), content_digest(b"supply"));
    }
}
