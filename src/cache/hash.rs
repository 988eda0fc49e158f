//! Content hashing for memo keys.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA256 of the JSON serialization of `value`, as lowercase hex.
///
/// Serialization preserves sequence order, so `[A, B]` and `[B, A]` hash
/// differently.
pub fn compute_hash<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(format!("{:x}", Sha256::digest(&json)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_requests_share_a_key() {
        let hints = json!(["Orders", ["Orders", "Users"]]);
        let key = compute_hash(&hints).unwrap();
        assert_eq!(key, compute_hash(&hints).unwrap());
        assert_eq!(key.len(), 64);
    }

    #[test]
    fn test_order_matters() {
        assert_ne!(
            compute_hash(&["Orders", "Users"]).unwrap(),
            compute_hash(&["Users", "Orders"]).unwrap()
        );
    }
}
