//! Error taxonomy shared by every crate in the workspace.
//!
//! Mirrors the kinds (not concrete type names) a git remote helper has to
//! report: a client-side policy violation, a lost or unobtainable lease, a
//! transport failure against the blob/KV stores, a failing `git` subprocess,
//! a failing encrypt/decrypt, or a bad environment/config.

use thiserror::Error;

use crate::ManifestError;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("remote already has branch `{remote}`, cannot push `{local}`")]
    MultiBranch { remote: String, local: String },
    #[error("remote has commits not present locally, pull before pushing")]
    NeedPull,
    #[error(
        "local tip hash is {local_len} hex chars but the manifest already uses {manifest_len}-char hashes"
    )]
    HashLengthMismatch { local_len: usize, manifest_len: usize },
    #[error("cannot derive a branch name from ref: {reference}")]
    NotABranch { reference: String },
    #[error("local ref `{local}` and remote ref `{remote}` name different branches; ref renaming is not supported")]
    RefRenameNotSupported { local: String, remote: String },
    #[error("remote not found: no push has ever succeeded against this prefix")]
    RemoteNotFound,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out waiting for lease on `{key}`")]
    Timeout { key: String },
    #[error("lease on `{key}` was lost before release")]
    Lost { key: String },
    #[error("lease item malformed: {0}")]
    Malformed(String),
    #[error("lease store transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("`git {args}` failed: {stderr}")]
    CommandFailed { args: String, stderr: String },
    #[error("could not parse git output for `{what}`: {got:?}")]
    UnparseableOutput { what: String, got: String },
    #[error("branch `{0}` does not exist")]
    NoSuchBranch(String),
    #[error("empty range, nothing to bundle")]
    EmptyRange,
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("cannot encrypt to an empty recipient set")]
    NoRecipients,
    #[error("decryption failed: wrong key, truncated, or tampered stream")]
    Decrypt,
    #[error("malformed key material: {0}")]
    MalformedKey(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{key}` not found")]
    NotFound { key: String },
    #[error("blob store transport failure on `{key}`: {reason}")]
    Transport { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed remote url `{0}`: {1}")]
    BadRemoteUrl(String, String),
    #[error("missing required environment variable `{0}`")]
    MissingEnv(String),
    #[error("could not read `{path}`: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed `.publickeys` at line {line}: {reason}")]
    MalformedRecipients { line: usize, reason: String },
}

/// The top-level error every `ark-core` entry point returns.
#[derive(Debug, Error)]
pub enum ArkError {
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyError),
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),
    #[error("blob store error: {0}")]
    Store(#[from] StoreError),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("metadata record malformed: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type ArkResult<T> = Result<T, ArkError>;
