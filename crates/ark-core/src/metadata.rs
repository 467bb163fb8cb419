//! Lock & Metadata (spec.md §4.5): the `RepoMetadata` (de)serialization
//! layer riding on the lease's opaque payload. `ark-lock` never sees a
//! `RepoMetadata`, only the bytes this module produces.

use ark_lock::LeaseGuard;
use ark_types::{ArkError, RepoMetadata};

/// Decode the metadata record carried by a held lease.
pub fn read(guard: &dyn LeaseGuard) -> Result<RepoMetadata, ArkError> {
    Ok(RepoMetadata::from_payload(guard.payload())?)
}

/// Decode the metadata record from an unlocked read (`LeaseStore::read`).
pub fn read_unlocked(payload: &[u8]) -> Result<RepoMetadata, ArkError> {
    Ok(RepoMetadata::from_payload(payload)?)
}

/// Serialize `metadata` back into the bytes `LeaseGuard::release` expects.
pub fn encode(metadata: &RepoMetadata) -> Result<Vec<u8>, ArkError> {
    Ok(metadata.to_payload()?)
}
