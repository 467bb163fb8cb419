//! The VCS Adapter (spec.md §4.3): a thin subprocess wrapper around the
//! host `git` binary. Every method shells out; none of them interpret git's
//! object model directly, the same tradeoff the original tool makes by
//! invoking `git` rather than linking libgit2.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use ark_types::{CommitHash, VcsError};

/// The range passed to `git bundle create`: either the full history of a
/// branch, or everything reachable from `branch` but not from `since`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleRange {
    Full { branch: String },
    Since { since: CommitHash, branch: String },
}

impl BundleRange {
    pub fn full(branch: impl Into<String>) -> Self {
        Self::Full { branch: branch.into() }
    }

    pub fn since(since: CommitHash, branch: impl Into<String>) -> Self {
        Self::Since { since, branch: branch.into() }
    }

    /// The revision range argument `git bundle create` expects.
    fn arg(&self) -> String {
        match self {
            BundleRange::Full { branch } => branch.clone(),
            BundleRange::Since { since, branch } => format!("{since}..{branch}"),
        }
    }
}

/// A handle to a git repository on disk, rooted at `path`.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn git(&self, args: &[&str]) -> Result<Output, VcsError> {
        Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .map_err(|e| VcsError::CommandFailed {
                args: args.join(" "),
                stderr: e.to_string(),
            })
    }

    fn git_ok(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// The current tip commit of `branch`, or `None` if the branch does not
    /// exist locally.
    pub fn tip(&self, branch: &str) -> Result<Option<CommitHash>, VcsError> {
        let output = self.git(&["log", "-1", "--format=%H", branch])?;
        if !output.status.success() {
            return Ok(None);
        }
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if hash.is_empty() {
            return Ok(None);
        }
        hash.parse().map(Some).map_err(|_| VcsError::UnparseableOutput {
            what: "git log --format=%H".into(),
            got: hash,
        })
    }

    /// True if `hash` is reachable from `branch` — used to confirm a push is
    /// a fast-forward of what the manifest already claims.
    pub fn contains(&self, branch: &str, hash: &CommitHash) -> Result<bool, VcsError> {
        let output = self.git(&["branch", branch, "--contains", hash.as_str()])?;
        Ok(output.status.success() && !output.stdout.is_empty())
    }

    /// Write a bundle for `range` to `dst`.
    pub fn bundle(&self, range: &BundleRange, dst: &Path) -> Result<(), VcsError> {
        let dst_str = dst.to_string_lossy().into_owned();
        let revspec = range.arg();
        self.git_ok(&["bundle", "create", &dst_str, &revspec])?;
        Ok(())
    }

    /// Unpack a bundle previously written by [`GitRepo::bundle`] into this
    /// repository's object store and refs.
    pub fn unbundle(&self, src: &Path) -> Result<(), VcsError> {
        let src_str = src.to_string_lossy().into_owned();
        self.git_ok(&["bundle", "unbundle", &src_str])?;
        Ok(())
    }

    /// The hash algorithm's hex length this repository was initialized
    /// with (40 for sha1, 64 for sha256) — read from `git rev-parse
    /// --show-object-format`, falling back to sha1 on older git.
    pub fn hash_len(&self) -> Result<usize, VcsError> {
        let output = self.git(&["rev-parse", "--show-object-format"]);
        let format = match output {
            Ok(o) if o.status.success() => String::from_utf8_lossy(&o.stdout).trim().to_string(),
            _ => "sha1".to_string(),
        };
        match format.as_str() {
            "sha256" => Ok(ark_types::SHA256_HEX_LEN),
            _ => Ok(ark_types::SHA1_HEX_LEN),
        }
    }

    /// True if `branch` resolves to a real ref — used to distinguish "push
    /// to a repo with nothing yet" from "branch genuinely missing".
    pub fn branch_exists(&self, branch: &str) -> Result<bool, VcsError> {
        let output = self.git(&["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])?;
        Ok(output.status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::tempdir;

    fn init_repo(path: &Path) -> GitRepo {
        StdCommand::new("git").args(["init", "-q"]).current_dir(path).output().expect("git init");
        StdCommand::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(path)
            .output()
            .expect("git config");
        StdCommand::new("git")
            .args(["config", "user.name", "Test"])
            .current_dir(path)
            .output()
            .expect("git config");
        GitRepo::open(path)
    }

    fn commit(repo: &GitRepo, msg: &str) -> CommitHash {
        StdCommand::new("git")
            .args(["commit", "--allow-empty", "-m", msg])
            .current_dir(repo.path())
            .output()
            .expect("git commit");
        repo.tip("HEAD").expect("tip").expect("some tip")
    }

    #[test]
    fn tip_of_empty_repo_is_none() {
        let td = tempdir().unwrap();
        let repo = init_repo(td.path());
        assert_eq!(repo.tip("main").unwrap(), None);
    }

    #[test]
    fn tip_tracks_commits() {
        let td = tempdir().unwrap();
        let repo = init_repo(td.path());
        let first = commit(&repo, "one");
        let second = commit(&repo, "two");
        assert_ne!(first, second);
        assert_eq!(repo.tip("HEAD").unwrap(), Some(second));
    }

    #[test]
    fn contains_reflects_ancestry() {
        let td = tempdir().unwrap();
        let repo = init_repo(td.path());
        let first = commit(&repo, "one");
        commit(&repo, "two");
        assert!(repo.contains("HEAD", &first).unwrap());
    }

    #[test]
    fn bundle_roundtrips_through_unbundle() {
        let src_dir = tempdir().unwrap();
        let src_repo = init_repo(src_dir.path());
        commit(&src_repo, "one");

        let bundle_path = src_dir.path().join("out.bundle");
        src_repo
            .bundle(&BundleRange::full("HEAD"), &bundle_path)
            .expect("bundle create");
        assert!(bundle_path.exists());

        let dst_dir = tempdir().unwrap();
        let dst_repo = init_repo(dst_dir.path());
        dst_repo.unbundle(&bundle_path).expect("unbundle");
    }

    #[test]
    fn branch_exists_false_before_first_commit() {
        let td = tempdir().unwrap();
        let repo = init_repo(td.path());
        assert!(!repo.branch_exists("main").unwrap());
    }
}
