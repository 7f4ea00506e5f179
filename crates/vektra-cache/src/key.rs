//! Cache key derivation.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derives the cache file name for a document.
///
/// The key is a digest of the workspace id and document name, so renaming a
/// document (or moving it between workspaces) addresses a different file.
pub fn cache_key(workspace_id: Uuid, document_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("ws_{workspace_id}_{document_name}"));
    format!("{}.json", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic_and_name_sensitive() {
        let ws = Uuid::new_v4();
        let a = cache_key(ws, "report.pdf");
        let b = cache_key(ws, "report.pdf");
        let c = cache_key(ws, "other.pdf");
        let d = cache_key(Uuid::new_v4(), "report.pdf");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.ends_with(".json"));
        // SHA-256 hex digest plus suffix.
        assert_eq!(a.len(), 64 + 5);
    }
}
