//! Cache namespace fingerprints using SHA-256 hashes

use sha2::{Digest, Sha256};

/// Fingerprint of an OAuth credential pair.
///
/// Names the token cache namespace so the secret itself never appears on disk
/// as a path component.
pub fn credentials_fingerprint(client_id: &str, client_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_id.as_bytes());
    hasher.update(b":");
    hasher.update(client_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of an ordered list of workbook names.
///
/// The list is hashed in its serialized JSON form, so order and element
/// boundaries are both significant (`["ab"]` and `["a", "b"]` differ).
pub fn workbooks_fingerprint(names: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"[");
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            hasher.update(b",");
        }
        // serde_json string encoding cannot fail for &str
        let encoded = serde_json::Value::String(name.clone()).to_string();
        hasher.update(encoded.as_bytes());
    }
    hasher.update(b"]");
    format!("{:x}", hasher.finalize())
}
