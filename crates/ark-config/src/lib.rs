//! Ambient bootstrap for `git-remote-ark` (spec.md §6): resolving key
//! material from the environment and reading the working-copy-local
//! `.publickeys` file. `RemoteUrl` parsing itself lives in
//! `ark_core::naming`, since the key material the protocol encrypts to has
//! nothing to do with which bucket/table/prefix it is pushed to.

use std::path::{Path, PathBuf};

use ark_crypto::{Recipient, SecretKey};
use ark_types::ConfigError;

const DEFAULT_PUBLICKEY_REL: &str = ".ark/publickey";
const DEFAULT_SECRETKEY_REL: &str = ".ark/secretkey";
const PUBLICKEYS_FILE: &str = ".publickeys";

/// Resolve the operator's own secret key, consulting `ARK_SECRETKEY`
/// before falling back to `~/.ark/secretkey`.
pub fn resolve_secret_key(home: &Path) -> Result<SecretKey, ConfigError> {
    let path = std::env::var("ARK_SECRETKEY")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(DEFAULT_SECRETKEY_REL));
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::ReadFile { path: path.display().to_string(), source: e })?;
    SecretKey::parse(raw.trim())
        .map_err(|e| ConfigError::MalformedRecipients { line: 0, reason: e.to_string() })
}

/// Resolve the operator's own public key, consulting `ARK_PUBLICKEY`
/// before falling back to `~/.ark/publickey`.
pub fn resolve_public_key(home: &Path) -> Result<Recipient, ConfigError> {
    let path = std::env::var("ARK_PUBLICKEY")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(DEFAULT_PUBLICKEY_REL));
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::ReadFile { path: path.display().to_string(), source: e })?;
    Recipient::parse(raw.trim())
        .map_err(|e| ConfigError::MalformedRecipients { line: 0, reason: e.to_string() })
}

/// Read every recipient from the working copy's `.publickeys` file, one
/// bech32 key per line, blank lines and `#`-comments ignored. Always read
/// from the working copy root — unlike the key-file paths, this one is
/// never overridden by an env var.
pub fn load_publickeys(worktree_root: &Path) -> Result<Vec<Recipient>, ConfigError> {
    let path = worktree_root.join(PUBLICKEYS_FILE);
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::ReadFile { path: path.display().to_string(), source: e })?;

    let mut recipients = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let recipient = Recipient::parse(trimmed).map_err(|e| ConfigError::MalformedRecipients {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        recipients.push(recipient);
    }
    Ok(recipients)
}

/// Required `GIT_DIR` env var naming the `.git` directory git invoked the
/// helper against. The helper chdirs to its parent before any VCS call.
pub fn git_dir() -> Result<PathBuf, ConfigError> {
    std::env::var("GIT_DIR")
        .map(PathBuf::from)
        .map_err(|_| ConfigError::MissingEnv("GIT_DIR".to_string()))
}

/// Whether the `ensure` env var was set to `y`, gating bucket/table
/// auto-creation in `ark-store`/`ark-lock`.
pub fn wants_ensure() -> bool {
    std::env::var("ensure").as_deref() == Ok("y")
}
