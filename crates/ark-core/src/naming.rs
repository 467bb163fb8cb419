//! Naming & Paths (spec.md §4.1): the remote URL and the key layout it
//! implies. Pure string arithmetic — no I/O.

use ark_types::ConfigError;

/// A parsed `ark://bucket+table/prefix` remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub bucket: String,
    pub table: String,
    pub prefix: String,
}

impl RemoteUrl {
    /// Parse `scheme://<bucket>+<table>/<prefix>`, stripping a trailing
    /// slash from `prefix` (spec.md §4.1).
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let body = raw.strip_prefix("ark://").ok_or_else(|| {
            ConfigError::BadRemoteUrl(raw.to_string(), "missing `ark://` scheme".to_string())
        })?;

        let (bucket_and_table, prefix) = body.split_once('/').ok_or_else(|| {
            ConfigError::BadRemoteUrl(raw.to_string(), "missing `/prefix` component".to_string())
        })?;

        let (bucket, table) = bucket_and_table.split_once('+').ok_or_else(|| {
            ConfigError::BadRemoteUrl(raw.to_string(), "missing `bucket+table` separator".to_string())
        })?;

        let prefix = prefix.trim_end_matches('/');

        if bucket.is_empty() || table.is_empty() || prefix.is_empty() {
            return Err(ConfigError::BadRemoteUrl(
                raw.to_string(),
                "bucket, table, and prefix must all be non-empty".to_string(),
            ));
        }

        Ok(Self { bucket: bucket.to_string(), table: table.to_string(), prefix: prefix.to_string() })
    }

    /// `{prefix}/bundles_{tip}`, the manifest key for a push that ends at
    /// `tip`.
    pub fn manifest_key(&self, tip: &str) -> String {
        format!("{}/bundles_{tip}", self.prefix)
    }

    /// `{prefix}/{bundle_name}`, the blob key a bundle is stored under.
    pub fn bundle_key(&self, bundle_name: &str) -> String {
        format!("{}/{bundle_name}", self.prefix)
    }

    /// The lease key, `bucket/prefix` in the original tool's terms.
    pub fn lease_key(&self) -> String {
        format!("{}/{}", self.bucket, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_url() {
        let url = RemoteUrl::parse("ark://my-bucket+my-table/prefix").unwrap();
        assert_eq!(url.bucket, "my-bucket");
        assert_eq!(url.table, "my-table");
        assert_eq!(url.prefix, "prefix");
    }

    #[test]
    fn strips_trailing_slash_from_prefix() {
        let url = RemoteUrl::parse("ark://b+t/prefix/").unwrap();
        assert_eq!(url.prefix, "prefix");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(matches!(
            RemoteUrl::parse("my-bucket+my-table/prefix"),
            Err(ConfigError::BadRemoteUrl(_, _))
        ));
    }

    #[test]
    fn rejects_missing_plus_separator() {
        assert!(matches!(RemoteUrl::parse("ark://my-bucket/prefix"), Err(ConfigError::BadRemoteUrl(_, _))));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(matches!(RemoteUrl::parse("ark://bucket+table"), Err(ConfigError::BadRemoteUrl(_, _))));
    }

    #[test]
    fn manifest_and_bundle_keys_are_prefixed() {
        let url = RemoteUrl::parse("ark://b+t/myprefix").unwrap();
        assert_eq!(url.manifest_key("abc123"), "myprefix/bundles_abc123");
        assert_eq!(url.bundle_key("00..ff"), "myprefix/00..ff");
        assert_eq!(url.lease_key(), "b/myprefix");
    }
}
