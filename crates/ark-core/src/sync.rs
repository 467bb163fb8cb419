//! Sync Protocol (spec.md §4.6): the push state machine. All 14 steps are
//! load-bearing — ordering bundle-upload before manifest-publish before
//! lock-release-with-update before retire-old-manifest is what keeps every
//! crash window recoverable (§5, §9 "Ordering rationale").

use std::time::Duration;

use ark_crypto::Recipient;
use ark_lock::{lock, LeaseGuard, LeaseStore};
use ark_store::BlobStore;
use ark_types::{ArkError, BundleName, Manifest, PolicyError, VcsError};
use ark_vcs::{BundleRange, GitRepo};

use crate::naming::RemoteUrl;
use crate::reporter::Reporter;
use crate::{manifest, metadata};

/// Lease TTL and retry cadence from spec.md §5: a ~10s lease kept live by
/// the lock primitive, retried roughly every second while contended.
const LEASE_TTL: Duration = Duration::from_secs(10);
const LEASE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// `localRef`/`remoteRef` must resolve to the same branch name — no ref
/// renaming (spec.md §4.6 opening line). The `refs/heads/` prefix is not
/// required: the original takes a ref's last path segment regardless of
/// namespace (`refs/tags/v1` yields the branch name `v1`) and only rejects
/// it once it conflicts with an already-stored branch, via the ordinary
/// multi-branch check in step 3 — so a tag pushed to a brand-new prefix
/// succeeds and establishes that name as the remote's branch.
fn branch_name_of(reference: &str) -> Result<&str, PolicyError> {
    reference
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PolicyError::NotABranch { reference: reference.to_string() })
}

fn release_unchanged(guard: Box<dyn LeaseGuard>, original_payload: &[u8], reporter: &mut dyn Reporter) {
    if let Err(e) = guard.release(original_payload) {
        reporter.error(&format!("failed to release lease after aborting push: {e}"));
    }
}

/// Run a single push attempt of `local_ref:remote_ref`. Returns `Ok(())` for
/// both an actual push and a no-op (tip already published) — the caller
/// (`ark-cli`) emits the `ok <localRef>` protocol line for either.
pub fn push(
    repo: &GitRepo,
    lease_store: &dyn LeaseStore,
    blob_store: &dyn BlobStore,
    url: &RemoteUrl,
    recipients: &[Recipient],
    local_ref: &str,
    remote_ref: &str,
    reporter: &mut dyn Reporter,
) -> Result<(), ArkError> {
    let local_branch = branch_name_of(local_ref)?;
    let remote_branch = branch_name_of(remote_ref)?;
    if local_branch != remote_branch {
        return Err(PolicyError::RefRenameNotSupported {
            local: local_branch.to_string(),
            remote: remote_branch.to_string(),
        }
        .into());
    }
    let branch = local_branch;

    // 1. Acquire.
    reporter.info(&format!("acquiring lease on {}", url.lease_key()));
    let guard = lock(lease_store, &url.lease_key(), LEASE_TTL, LEASE_RETRY_INTERVAL)?;
    let original_payload = guard.payload().to_vec();
    let mut record = match metadata::read(guard.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            release_unchanged(guard, &original_payload, reporter);
            return Err(e);
        }
    };

    // 2. Load manifest.
    let loaded_manifest = match &record.bundles {
        Some(key) => manifest::get_manifest(blob_store, key),
        None => Ok(Manifest::empty()),
    };
    let existing_manifest = match loaded_manifest {
        Ok(m) => m,
        Err(e) => {
            release_unchanged(guard, &original_payload, reporter);
            return Err(e);
        }
    };

    // 3. Branch check.
    match &record.branch {
        None => record.branch = Some(branch.to_string()),
        Some(existing) if existing != branch => {
            let err = PolicyError::MultiBranch { remote: existing.clone(), local: branch.to_string() };
            release_unchanged(guard, &original_payload, reporter);
            return Err(err.into());
        }
        Some(_) => {}
    }

    // 4. Local tip.
    let tip = match repo.tip(branch) {
        Ok(Some(hash)) => hash,
        Ok(None) => {
            release_unchanged(guard, &original_payload, reporter);
            return Err(VcsError::NoSuchBranch(branch.to_string()).into());
        }
        Err(e) => {
            release_unchanged(guard, &original_payload, reporter);
            return Err(e.into());
        }
    };

    // Enrichment: mixed hash lengths across pushes are rejected outright,
    // before any bundling is attempted (spec.md §9 "Open question").
    if let Some(last) = existing_manifest.last() {
        if last.end.len() != tip.len() {
            let err = PolicyError::HashLengthMismatch { local_len: tip.len(), manifest_len: last.end.len() };
            release_unchanged(guard, &original_payload, reporter);
            return Err(err.into());
        }
    }

    // 5. No-op.
    if let Some(last) = existing_manifest.last() {
        if last.end == tip {
            reporter.info("remote already at local tip, nothing to push");
            release_unchanged(guard, &original_payload, reporter);
            return Ok(());
        }
    }

    // 6. Fast-forward check, 7. compute bundle.
    let (range, name) = match existing_manifest.last() {
        Some(last) => {
            match repo.contains(branch, &last.end) {
                Ok(true) => {}
                Ok(false) => {
                    release_unchanged(guard, &original_payload, reporter);
                    return Err(PolicyError::NeedPull.into());
                }
                Err(e) => {
                    release_unchanged(guard, &original_payload, reporter);
                    return Err(e.into());
                }
            }
            let name = match BundleName::new(last.end.clone(), tip.clone()) {
                Ok(n) => n,
                Err(e) => {
                    release_unchanged(guard, &original_payload, reporter);
                    return Err(ark_types::ManifestError::from(e).into());
                }
            };
            (BundleRange::since(last.end.clone(), branch), name)
        }
        None => (BundleRange::full(branch), BundleName::initial(tip.clone())),
    };

    // 8. Pack.
    let tempdir = match tempfile::tempdir() {
        Ok(t) => t,
        Err(e) => {
            release_unchanged(guard, &original_payload, reporter);
            return Err(e.into());
        }
    };
    let bundle_path = tempdir.path().join(name.to_string());
    if let Err(e) = repo.bundle(&range, &bundle_path) {
        release_unchanged(guard, &original_payload, reporter);
        return Err(e.into());
    }

    // 9. Encrypt.
    let encrypted_path = tempdir.path().join(format!("{name}.enc"));
    let encrypt_result = (|| -> Result<(), ArkError> {
        let src = std::fs::File::open(&bundle_path)?;
        let dst = std::fs::File::create(&encrypted_path)?;
        ark_crypto::encrypt_to_recipients(recipients, src, dst)?;
        Ok(())
    })();
    if let Err(e) = encrypt_result {
        release_unchanged(guard, &original_payload, reporter);
        return Err(e);
    }

    // 10. Upload bundle.
    let upload_result = (|| -> Result<(), ArkError> {
        let ciphertext = std::fs::read(&encrypted_path)?;
        blob_store.put(&url.bundle_key(&name.to_string()), &ciphertext)?;
        Ok(())
    })();
    if let Err(e) = upload_result {
        release_unchanged(guard, &original_payload, reporter);
        return Err(e);
    }
    reporter.info(&format!("put {}", url.bundle_key(&name.to_string())));

    // 11. Publish new manifest.
    let new_manifest = match existing_manifest.appended(name) {
        Ok(m) => m,
        Err(e) => {
            release_unchanged(guard, &original_payload, reporter);
            return Err(e.into());
        }
    };
    let old_key = record.bundles.clone();
    let new_key = url.manifest_key(tip.as_str());
    if let Err(e) = manifest::put_manifest(blob_store, &new_key, &new_manifest) {
        release_unchanged(guard, &original_payload, reporter);
        return Err(e);
    }
    record.bundles = Some(new_key.clone());

    // 12. Release with update. No compensation past this point: a lost
    // lease here is fatal and is surfaced as-is (spec.md §4.6 step 12).
    let new_payload = match metadata::encode(&record) {
        Ok(p) => p,
        Err(e) => {
            release_unchanged(guard, &original_payload, reporter);
            return Err(e);
        }
    };
    guard.release(&new_payload)?;

    // 13. Retire old manifest — best-effort, after release, never re-locks.
    if let Some(old) = old_key {
        if old != new_key {
            if let Err(e) = manifest::delete_manifest(blob_store, &old) {
                reporter.warn(&format!("could not delete superseded manifest {old}: {e}"));
            }
        }
    }

    // 14. Report.
    reporter.info(&format!("pushed {branch} to {tip}"));
    Ok(())
}
