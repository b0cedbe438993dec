//! Fixed-delay retry policy
//!
//! The startup sequence retries platform authentication indefinitely rather
//! than crash-looping: for an unattended device adapter there is nobody
//! around to restart the process, so a blocked startup with a log line per
//! attempt is the preferable failure mode.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info};

/// Retry policy with an unbounded attempt count and a fixed delay
///
/// No backoff and no attempt limit; every failure waits the same interval
/// before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy that waits `delay` between attempts
    pub const fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// The delay applied between attempts
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

/// Runs `op` until it succeeds, waiting `policy.delay()` after each failure
///
/// Never returns an error; under a persistently failing `op` this blocks the
/// caller indefinitely, logging each failure. `what` names the operation in
/// those log lines.
pub async fn forever<T, E, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = core::result::Result<T, E>>,
    E: Display,
{
    loop {
        match op().await {
            Ok(value) => return value,
            Err(err) => {
                error!("{what} failed: {err}");
                info!("retrying {what} in {}s", policy.delay().as_secs());
                tokio::time::sleep(policy.delay()).await;
            }
        }
    }
}
