//! Bounded polling loop for acquiring the repository lease (spec.md §4.5,
//! §5: "block with a bounded retry interval (≈1s) until held or a
//! caller-level timeout fires").
//!
//! This is intentionally narrower than a general retry/backoff library: the
//! lease acquire loop is the only place in the protocol that retries, and it
//! always retries at a constant interval, never exponential — a growing
//! interval would only lengthen the window during which a contended push
//! waits behind another client's lease.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Configuration for the lease acquire poll loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay between attempts.
    pub retry_interval: Duration,
    /// Give up after this much wall-clock time has elapsed.
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(retry_interval: Duration, timeout: Duration) -> Self {
        Self { retry_interval, timeout }
    }
}

impl Default for PollPolicy {
    /// ≈1s retry interval, matching the original tool's
    /// `dynamolock.Lock(ctx, table, key, 10*time.Second, 1*time.Second)`.
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Poll `attempt` until it returns `Some(_)` or `policy.timeout` elapses,
/// sleeping `policy.retry_interval` between attempts. Returns `None` on
/// timeout so the caller can attach its own error (`LockError::Timeout`).
pub fn poll_until<T>(policy: PollPolicy, mut attempt: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + policy.timeout;
    loop {
        if let Some(v) = attempt() {
            return Some(v);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(
            policy
                .retry_interval
                .min(deadline.saturating_duration_since(Instant::now())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_first_success() {
        let policy = PollPolicy::new(Duration::from_millis(1), Duration::from_secs(1));
        let mut calls = 0;
        let result = poll_until(policy, || {
            calls += 1;
            if calls >= 3 { Some(calls) } else { None }
        });
        assert_eq!(result, Some(3));
    }

    #[test]
    fn times_out_when_never_satisfied() {
        let policy = PollPolicy::new(Duration::from_millis(1), Duration::from_millis(20));
        let result: Option<()> = poll_until(policy, || None);
        assert_eq!(result, None);
    }
}
