//! Polling for eventual server-side readiness.
//!
//! [`poll_until`] re-runs a probe on a fixed interval until it reports ready
//! or the time budget runs out. Running out is not an error: the function
//! returns `false` and the caller treats "still not ready" as the timeout.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollOptions {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            timeout_ms: 10_000,
        }
    }
}

impl PollOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Probe until ready. Returns whether readiness was observed in time.
pub async fn poll_until<F, Fut>(options: PollOptions, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + options.timeout();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if probe().await {
            debug!(attempts, "ready");
            return true;
        }
        if Instant::now() + options.interval() > deadline {
            debug!(attempts, timeout_ms = options.timeout_ms, "stopped polling");
            return false;
        }
        sleep(options.interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> PollOptions {
        PollOptions::new(Duration::from_millis(1), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn returns_once_probe_succeeds() {
        let calls = AtomicU32::new(0);
        let ready = poll_until(fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { n >= 3 }
        })
        .await;

        assert!(ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_silently_after_the_budget() {
        let options = PollOptions::new(Duration::from_millis(5), Duration::from_millis(20));
        let calls = AtomicU32::new(0);
        let ready = poll_until(options, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;

        assert!(!ready);
        let calls = calls.load(Ordering::SeqCst);
        assert!((1..=5).contains(&calls), "probed {calls} times");
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: PollOptions = serde_json::from_str(r#"{ "interval_ms": 50 }"#).unwrap();
        assert_eq!(options.interval(), Duration::from_millis(50));
        assert_eq!(options.timeout(), Duration::from_secs(10));
    }
}
