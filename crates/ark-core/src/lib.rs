//! The git-remote-ark sync protocol, wired against the collaborator traits
//! from `ark-vcs`, `ark-store`, `ark-lock`, and `ark-crypto`. Everything
//! here is pure protocol logic — no argv parsing, no stdin/stdout framing;
//! that's `ark-cli`'s job.

pub mod fetch;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod reporter;
pub mod sync;

pub use naming::RemoteUrl;
pub use reporter::{NullReporter, Reporter};
