//! Content hashing for mutation records.
//!
//! Every record carries the SHA-256 of its target's state after the record
//! is applied. Replaying a log from the empty state must reproduce the same
//! hashes, which is how a store detects a record built against a stale view.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Compute a SHA-256 hash of a serializable value.
///
/// The value is serialized to JSON first, so the hash is a deterministic
/// fingerprint of the content.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestState {
        id: String,
        value: i32,
    }

    #[test]
    fn test_content_hash_deterministic() {
        let state = TestState {
            id: "doc_1".into(),
            value: 42,
        };

        let hash1 = content_hash(&state).unwrap();
        let hash2 = content_hash(&state).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let a = TestState {
            id: "doc_1".into(),
            value: 42,
        };
        let b = TestState {
            id: "doc_1".into(),
            value: 43,
        };

        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }
}
