//! Manifest Store (spec.md §4.4): the ordered bundle-name list, stored as
//! one newline-joined blob per key. An absent key is the empty manifest,
//! never an error.

use ark_store::BlobStore;
use ark_types::{ArkError, Manifest, StoreError};

/// Download and parse the manifest at `key`. Absent key ⇒ empty manifest.
pub fn get_manifest(store: &dyn BlobStore, key: &str) -> Result<Manifest, ArkError> {
    match store.get(key) {
        Ok(bytes) => Ok(Manifest::parse(&String::from_utf8_lossy(&bytes))?),
        Err(StoreError::NotFound { .. }) => Ok(Manifest::empty()),
        Err(e) => Err(ArkError::Store(e)),
    }
}

/// Upload `manifest` to `prefix/bundles_<tip>`, returning the key it was
/// written under.
pub fn put_manifest(
    store: &dyn BlobStore,
    prefix_manifest_key: &str,
    manifest: &Manifest,
) -> Result<(), ArkError> {
    store.put(prefix_manifest_key, manifest.to_wire().as_bytes()).map_err(ArkError::Store)
}

/// Best-effort delete of a superseded manifest. A missing key is not an
/// error — the delete may race a concurrent cleanup.
pub fn delete_manifest(store: &dyn BlobStore, key: &str) -> Result<(), ArkError> {
    store.delete(key).map_err(ArkError::Store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_store::FileBlobStore;
    use ark_types::{BundleName, CommitHash};

    #[test]
    fn absent_key_is_empty_manifest() {
        let td = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(td.path());
        let m = get_manifest(&store, "prefix/bundles_nope").unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn put_then_get_roundtrips() {
        let td = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(td.path());
        let tip: CommitHash = "1".repeat(40).parse().unwrap();
        let manifest = Manifest::empty().appended(BundleName::initial(tip.clone())).unwrap();

        put_manifest(&store, "prefix/bundles_1111", &manifest).unwrap();
        let loaded = get_manifest(&store, "prefix/bundles_1111").unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn delete_of_missing_key_is_ok() {
        let td = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(td.path());
        assert!(delete_manifest(&store, "prefix/bundles_nope").is_ok());
    }
}
