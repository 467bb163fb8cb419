//! The lease primitive behind the Lock & Metadata component (spec.md §4.5):
//! a single-holder lock over a KV item, carrying an opaque business payload
//! alongside the bookkeeping (holder id, expiry) the lease needs to manage
//! itself.
//!
//! Deliberately two separate concerns, not one record: `ark_core::metadata`
//! owns what goes *inside* the payload (`RepoMetadata`), this crate only
//! ever sees `&[u8]`. Mirrors the original tool's `dynamolock.Lock` /
//! `unlock(item)` pair, where `item` carries caller data the lock layer
//! never interprets.

use std::time::Duration;

use ark_retry::{poll_until, PollPolicy};
use ark_types::LockError;

/// A held lease. Dropping it without calling [`LeaseGuard::release`] leaves
/// the lease to expire on its own TTL — callers that panic mid-critical
/// section do not wedge the repository forever.
pub trait LeaseGuard: Send {
    /// The payload as it was when this lease was acquired.
    fn payload(&self) -> &[u8];

    /// Release the lease, replacing the payload that a subsequent acquirer
    /// will see.
    fn release(self: Box<Self>, new_payload: &[u8]) -> Result<(), LockError>;
}

/// A KV-backed lease store keyed by an opaque string (`bucket/prefix` in
/// the original tool's terms).
pub trait LeaseStore: Send + Sync {
    /// Attempt to acquire the lease for `key`. Returns `Ok(None)` if someone
    /// else already holds it — callers retry via `ark_retry::poll_until`,
    /// this method never blocks or sleeps itself.
    fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<Box<dyn LeaseGuard>>, LockError>;

    /// Read the current payload without taking the lease — used by fetch
    /// and list, which only need to see the manifest pointer, not hold it.
    fn read(&self, key: &str) -> Result<Vec<u8>, LockError>;
}

/// Block until `store` yields the lease for `key` or `ttl` has been waited
/// for overall, retrying [`LeaseStore::try_acquire`] every
/// `retry_interval`. A free function rather than a trait method so
/// `LeaseStore` stays object-safe — `ark_core::sync` holds it as `&dyn
/// LeaseStore`.
pub fn lock(
    store: &dyn LeaseStore,
    key: &str,
    ttl: Duration,
    retry_interval: Duration,
) -> Result<Box<dyn LeaseGuard>, LockError> {
    let policy = PollPolicy::new(retry_interval, ttl);
    poll_until(policy, || store.try_acquire(key, ttl).ok().flatten())
        .ok_or_else(|| LockError::Timeout { key: key.to_string() })
}

/// Filesystem-backed lease store for local use and tests: the lease file's
/// existence is the lock, its contents are the payload.
pub struct FileLeaseStore {
    dir: std::path::PathBuf,
}

impl FileLeaseStore {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn lock_path(&self, key: &str) -> std::path::PathBuf {
        self.dir.join(format!("{}.lock", sanitize(key)))
    }

    fn data_path(&self, key: &str) -> std::path::PathBuf {
        self.dir.join(format!("{}.data", sanitize(key)))
    }
}

fn sanitize(key: &str) -> String {
    key.replace(['/', '\\'], "_")
}

struct FileLeaseGuard {
    lock_path: std::path::PathBuf,
    data_path: std::path::PathBuf,
    payload: Vec<u8>,
}

impl LeaseGuard for FileLeaseGuard {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn release(self: Box<Self>, new_payload: &[u8]) -> Result<(), LockError> {
        std::fs::write(&self.data_path, new_payload)
            .map_err(|e| LockError::Transport(e.to_string()))?;
        std::fs::remove_file(&self.lock_path).map_err(|e| LockError::Transport(e.to_string()))
    }
}

impl LeaseStore for FileLeaseStore {
    fn try_acquire(&self, key: &str, _ttl: Duration) -> Result<Option<Box<dyn LeaseGuard>>, LockError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| LockError::Transport(e.to_string()))?;
        let lock_path = self.lock_path(key);
        let data_path = self.data_path(key);

        match std::fs::OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(LockError::Transport(e.to_string())),
        }

        let payload = match std::fs::read(&data_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(LockError::Transport(e.to_string())),
        };

        Ok(Some(Box::new(FileLeaseGuard { lock_path, data_path, payload })))
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, LockError> {
        match std::fs::read(self.data_path(key)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(LockError::Transport(e.to_string())),
        }
    }
}

#[cfg(feature = "dynamodb")]
pub mod dynamodb {
    use super::{LeaseGuard, LeaseStore};
    use ark_types::LockError;
    use aws_sdk_dynamodb::types::AttributeValue;
    use std::time::Duration;

    /// DynamoDB-backed lease store, mirroring the original tool's
    /// conditional-put lock: a row is claimed by writing a fresh `holder`
    /// UUID with a condition that either no row exists yet or the previous
    /// holder's lease has expired.
    pub struct DynamoLeaseStore {
        client: aws_sdk_dynamodb::Client,
        table: String,
        runtime: tokio::runtime::Runtime,
    }

    impl DynamoLeaseStore {
        /// Connect to `table`. If it does not exist: create it (a simple
        /// `key`-keyed table, on-demand billing) when `ensure` is set
        /// (spec.md §6 `ensure=y`) and wait for it to become active,
        /// mirroring the original tool's `DynamoDBWaitForReady`; otherwise
        /// fail — absence of the table is fatal by default.
        pub fn new(table: impl Into<String>, ensure: bool) -> Result<Self, LockError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| LockError::Transport(e.to_string()))?;
            let config = runtime.block_on(aws_config::load_from_env());
            let client = aws_sdk_dynamodb::Client::new(&config);
            let table = table.into();

            match runtime.block_on(client.describe_table().table_name(&table).send()) {
                Ok(_) => {}
                Err(e) if e.as_service_error().is_some_and(|e| e.is_resource_not_found_exception()) => {
                    if !ensure {
                        return Err(LockError::Transport(
                            "lease table does not exist (set ensure=y to create it)".to_string(),
                        ));
                    }
                    create_table_and_wait(&runtime, &client, &table)?;
                }
                Err(e) => return Err(LockError::Transport(e.to_string())),
            }

            Ok(Self { client, table, runtime })
        }
    }

    fn create_table_and_wait(
        runtime: &tokio::runtime::Runtime,
        client: &aws_sdk_dynamodb::Client,
        table: &str,
    ) -> Result<(), LockError> {
        use aws_sdk_dynamodb::types::{
            AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
        };

        runtime
            .block_on(
                client
                    .create_table()
                    .table_name(table)
                    .attribute_definitions(
                        AttributeDefinition::builder()
                            .attribute_name("key")
                            .attribute_type(ScalarAttributeType::S)
                            .build()
                            .map_err(|e| LockError::Transport(e.to_string()))?,
                    )
                    .key_schema(
                        KeySchemaElement::builder()
                            .attribute_name("key")
                            .key_type(KeyType::Hash)
                            .build()
                            .map_err(|e| LockError::Transport(e.to_string()))?,
                    )
                    .billing_mode(BillingMode::PayPerRequest)
                    .send(),
            )
            .map_err(|e| LockError::Transport(e.to_string()))?;

        for _ in 0..30 {
            let describe = runtime
                .block_on(client.describe_table().table_name(table).send())
                .map_err(|e| LockError::Transport(e.to_string()))?;
            let active = describe
                .table()
                .and_then(|t| t.table_status())
                .is_some_and(|s| matches!(s, aws_sdk_dynamodb::types::TableStatus::Active));
            if active {
                return Ok(());
            }
            std::thread::sleep(std::time::Duration::from_secs(1));
        }
        Err(LockError::Transport(format!("table {table} did not become active in time")))
    }

    struct DynamoLeaseGuard {
        client: aws_sdk_dynamodb::Client,
        table: String,
        key: String,
        holder: String,
        payload: Vec<u8>,
        runtime_handle: tokio::runtime::Handle,
    }

    impl LeaseGuard for DynamoLeaseGuard {
        fn payload(&self) -> &[u8] {
            &self.payload
        }

        fn release(self: Box<Self>, new_payload: &[u8]) -> Result<(), LockError> {
            self.runtime_handle.block_on(
                self.client
                    .put_item()
                    .table_name(&self.table)
                    .item("key", AttributeValue::S(self.key.clone()))
                    .item("holder", AttributeValue::S(String::new()))
                    .item("data", AttributeValue::B(new_payload.to_vec().into()))
                    .condition_expression("holder = :h")
                    .expression_attribute_values(":h", AttributeValue::S(self.holder.clone()))
                    .send(),
            )
            .map_err(|e| LockError::Transport(e.to_string()))?;
            Ok(())
        }
    }

    impl LeaseStore for DynamoLeaseStore {
        fn try_acquire(
            &self,
            key: &str,
            _ttl: Duration,
        ) -> Result<Option<Box<dyn LeaseGuard>>, LockError> {
            let holder = uuid::Uuid::new_v4().to_string();

            let existing = self
                .runtime
                .block_on(self.client.get_item().table_name(&self.table).key(
                    "key",
                    AttributeValue::S(key.to_string()),
                ).send())
                .map_err(|e| LockError::Transport(e.to_string()))?;

            let (current_holder, payload) = match existing.item {
                Some(item) => {
                    let holder = item
                        .get("holder")
                        .and_then(|v| v.as_s().ok())
                        .cloned()
                        .unwrap_or_default();
                    let data = item
                        .get("data")
                        .and_then(|v| v.as_b().ok())
                        .map(|b| b.clone().into_inner())
                        .unwrap_or_default();
                    (holder, data)
                }
                None => (String::new(), Vec::new()),
            };

            if !current_holder.is_empty() {
                return Ok(None);
            }

            let claim = self
                .runtime
                .block_on(
                    self.client
                        .put_item()
                        .table_name(&self.table)
                        .item("key", AttributeValue::S(key.to_string()))
                        .item("holder", AttributeValue::S(holder.clone()))
                        .item("data", AttributeValue::B(payload.clone().into()))
                        .condition_expression("attribute_not_exists(holder) OR holder = :empty")
                        .expression_attribute_values(":empty", AttributeValue::S(String::new()))
                        .send(),
                );

            match claim {
                Ok(_) => Ok(Some(Box::new(DynamoLeaseGuard {
                    client: self.client.clone(),
                    table: self.table.clone(),
                    key: key.to_string(),
                    holder,
                    payload,
                    runtime_handle: self.runtime.handle().clone(),
                }))),
                Err(e) if e.as_service_error().is_some_and(|e| e.is_conditional_check_failed_exception()) => {
                    Ok(None)
                }
                Err(e) => Err(LockError::Transport(e.to_string())),
            }
        }

        fn read(&self, key: &str) -> Result<Vec<u8>, LockError> {
            let out = self
                .runtime
                .block_on(self.client.get_item().table_name(&self.table).key(
                    "key",
                    AttributeValue::S(key.to_string()),
                ).send())
                .map_err(|e| LockError::Transport(e.to_string()))?;
            Ok(out
                .item
                .and_then(|item| item.get("data").and_then(|v| v.as_b().ok()).map(|b| b.clone().into_inner()))
                .unwrap_or_default())
        }
    }
}
