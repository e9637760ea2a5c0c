use crate::config;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// Suspends the current task. Injected so retry and proxy boot delays can be
/// observed in tests without waiting on the wall clock.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

pub type SharedSleeper = Arc<dyn Sleeper>;

pub fn tokio_sleeper() -> SharedSleeper {
    Arc::new(TokioSleeper)
}

/// Bounded exponential backoff. Retryable statuses and transport failures
/// draw from the same retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: config::MAX_RETRIES,
            backoff_base_secs: config::BACKOFF_BASE_SECS,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after a failed `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let secs = self
            .backoff_base_secs
            .checked_pow(attempt + 1)
            .unwrap_or(u64::MAX);
        Duration::from_secs(secs)
    }

    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn is_retryable_status(status: u16) -> bool {
        config::RETRYABLE_STATUS_CODES.contains(&status)
    }
}
