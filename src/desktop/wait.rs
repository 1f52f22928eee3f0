//! Wait-for engine
//!
//! Bounded polling on a fixed cadence. The storefront renders asynchronously
//! and in no particular order, so every wait re-runs the lookup from its
//! ancestor until it matches or the budget runs out.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::locator::Locator;
use super::types::{ElementHandle, SearchSpec};
use crate::error::{AppError, Result};

/// Stand-in deadline for budgets too large to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + timeout`, clamped instead of overflowing on huge budgets
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Found(T),
    TimedOut,
}

impl<T> WaitOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Turn a miss into `AppError::Timeout(task)`
    pub fn or_timeout(self, task: impl Into<String>) -> Result<T> {
        match self {
            Self::Found(value) => Ok(value),
            Self::TimedOut => Err(AppError::Timeout(task.into())),
        }
    }
}

#[derive(Clone)]
pub struct Waiter {
    locator: Locator,
    poll_interval: Duration,
}

impl Waiter {
    pub fn new(locator: Locator, poll_interval: Duration) -> Self {
        Self {
            locator,
            poll_interval,
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Poll `probe` until it yields a value or `timeout` elapses.
    /// The probe always runs at least once; errors end the wait immediately.
    pub async fn until<T, F, Fut>(&self, timeout: Duration, mut probe: F) -> Result<WaitOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let deadline = deadline_after(timeout);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let Some(value) = probe().await? {
                tracing::trace!("wait satisfied after {} attempt(s)", attempts);
                return Ok(WaitOutcome::Found(value));
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("wait gave up after {} attempt(s) ({:?})", attempts, timeout);
                return Ok(WaitOutcome::TimedOut);
            }

            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Wait for an element matching `spec` to appear below `ancestor`
    pub async fn wait_for(
        &self,
        ancestor: &ElementHandle,
        spec: &SearchSpec,
        timeout: Duration,
    ) -> Result<WaitOutcome<ElementHandle>> {
        tracing::debug!("waiting up to {:?} for {} under {}", timeout, spec, ancestor);
        let locator = &self.locator;
        self.until(timeout, move || locator.find(ancestor, spec)).await
    }
}
