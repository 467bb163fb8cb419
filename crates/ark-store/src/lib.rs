//! The Blob Store (spec.md §2, §4.4): content-addressed-by-key storage for
//! manifests and encrypted bundles. A thin trait plus a filesystem backend
//! for local/test use and an optional S3 backend for production.

use ark_types::StoreError;

/// Unified interface for put/get/delete/list-by-prefix against a blob
/// store, independent of which cloud backs it.
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn exists(&self, key: &str) -> Result<bool, StoreError>;
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Filesystem-backed store, rooted at a base directory. Used for local
/// testing and for `file://` remotes.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    base: std::path::PathBuf,
}

impl FileBlobStore {
    pub fn new(base: impl Into<std::path::PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn full_path(&self, key: &str) -> std::path::PathBuf {
        self.base.join(key)
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        std::fs::read(self.full_path(key)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound { key: key.to_string() }
            } else {
                StoreError::Transport { key: key.to_string(), reason: e.to_string() }
            }
        })
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let full = self.full_path(key);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Transport { key: key.to_string(), reason: e.to_string() })?;
        }
        // write-then-rename so a concurrent reader never sees a partial object
        let tmp = full.with_extension("tmp");
        std::fs::write(&tmp, data)
            .map_err(|e| StoreError::Transport { key: key.to_string(), reason: e.to_string() })?;
        std::fs::rename(&tmp, &full)
            .map_err(|e| StoreError::Transport { key: key.to_string(), reason: e.to_string() })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let full = self.full_path(key);
        match std::fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Transport { key: key.to_string(), reason: e.to_string() }),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.full_path(key).exists())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.full_path(prefix);
        let parent = dir.parent().unwrap_or(&self.base);
        let file_prefix = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let entries = match std::fs::read_dir(parent) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Transport { key: prefix.to_string(), reason: e.to_string() }),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Transport { key: prefix.to_string(), reason: e.to_string() })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&file_prefix) && name != "tmp" {
                let rel = entry.path().strip_prefix(&self.base).unwrap_or(&entry.path()).to_string_lossy().into_owned();
                keys.push(rel);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(feature = "s3")]
pub mod s3 {
    use super::BlobStore;
    use ark_types::StoreError;
    use aws_sdk_s3::Client;

    /// S3-backed store. Holds its own single-threaded tokio runtime so the
    /// synchronous [`BlobStore`] trait can drive the async SDK.
    pub struct S3BlobStore {
        client: Client,
        bucket: String,
        runtime: tokio::runtime::Runtime,
    }

    impl S3BlobStore {
        /// Connect to `bucket`. If it does not exist: create it when
        /// `ensure` is set (spec.md §6 `ensure=y`), otherwise fail —
        /// absence of the bucket is fatal by default.
        pub fn new(bucket: impl Into<String>, ensure: bool) -> Result<Self, StoreError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| StoreError::Transport { key: String::new(), reason: e.to_string() })?;
            let config = runtime.block_on(aws_config::load_from_env());
            let client = Client::new(&config);
            let bucket = bucket.into();

            match runtime.block_on(client.head_bucket().bucket(&bucket).send()) {
                Ok(_) => {}
                Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => {
                    if !ensure {
                        return Err(StoreError::Transport {
                            key: bucket,
                            reason: "bucket does not exist (set ensure=y to create it)".to_string(),
                        });
                    }
                    runtime
                        .block_on(client.create_bucket().bucket(&bucket).send())
                        .map_err(|e| StoreError::Transport { key: bucket.clone(), reason: e.to_string() })?;
                }
                Err(e) => {
                    return Err(StoreError::Transport { key: bucket, reason: e.to_string() });
                }
            }

            Ok(Self { client, bucket, runtime })
        }
    }

    impl BlobStore for S3BlobStore {
        fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            let out = self.runtime.block_on(
                self.client.get_object().bucket(&self.bucket).key(key).send(),
            );
            let object = out.map_err(|e| StoreError::Transport { key: key.to_string(), reason: e.to_string() })?;
            let bytes = self
                .runtime
                .block_on(object.body.collect())
                .map_err(|e| StoreError::Transport { key: key.to_string(), reason: e.to_string() })?;
            Ok(bytes.into_bytes().to_vec())
        }

        fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
            self.runtime
                .block_on(
                    self.client
                        .put_object()
                        .bucket(&self.bucket)
                        .key(key)
                        .body(data.to_vec().into())
                        .send(),
                )
                .map_err(|e| StoreError::Transport { key: key.to_string(), reason: e.to_string() })?;
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.runtime
                .block_on(self.client.delete_object().bucket(&self.bucket).key(key).send())
                .map_err(|e| StoreError::Transport { key: key.to_string(), reason: e.to_string() })?;
            Ok(())
        }

        fn exists(&self, key: &str) -> Result<bool, StoreError> {
            match self.runtime.block_on(self.client.head_object().bucket(&self.bucket).key(key).send()) {
                Ok(_) => Ok(true),
                Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
                Err(e) => Err(StoreError::Transport { key: key.to_string(), reason: e.to_string() }),
            }
        }

        fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            let out = self.runtime.block_on(
                self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix).send(),
            );
            let out = out.map_err(|e| StoreError::Transport { key: prefix.to_string(), reason: e.to_string() })?;
            Ok(out.contents().iter().filter_map(|o| o.key().map(str::to_string)).collect())
        }
    }
}
