//! Settle policies: when to refresh the incident list after a hunt
//!
//! The backend accepts a hunt and runs it in the background without any
//! completion signal, so the list is refreshed on a best-effort schedule. The
//! refreshed list is not guaranteed to include the hunt's findings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::SettleConfig;
use crate::error::ConsoleResult;
use crate::incidents::IncidentRepository;

#[async_trait]
pub trait SettlePolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Refresh `repository` once the hunt has (probably) settled. `baseline`
    /// is the number of incidents held when the hunt was triggered. Returns
    /// the number of incidents after the last refresh.
    async fn settle(&self, repository: &IncidentRepository, baseline: usize) -> ConsoleResult<usize>;
}

/// Sleep once, refresh once
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl SettlePolicy for FixedDelay {
    fn name(&self) -> &'static str {
        "fixed_delay"
    }

    async fn settle(&self, repository: &IncidentRepository, _baseline: usize) -> ConsoleResult<usize> {
        tokio::time::sleep(self.delay).await;
        repository.refresh().await
    }
}

/// Refresh with geometrically growing pauses until the list grows past the
/// baseline or the attempts run out
pub struct BackoffPoller {
    initial: Duration,
    factor: u32,
    max_attempts: u32,
}

impl BackoffPoller {
    pub fn new(initial: Duration, factor: u32, max_attempts: u32) -> Self {
        Self {
            initial,
            factor: factor.max(1),
            max_attempts: max_attempts.max(1),
        }
    }
}

#[async_trait]
impl SettlePolicy for BackoffPoller {
    fn name(&self) -> &'static str {
        "backoff"
    }

    async fn settle(&self, repository: &IncidentRepository, baseline: usize) -> ConsoleResult<usize> {
        let mut delay = self.initial;
        let mut last = Ok(baseline);

        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(delay).await;
            let refreshed = repository.refresh().await;
            match refreshed {
                Ok(count) if count > baseline => return Ok(count),
                Ok(count) => debug!("Hunt not visible yet ({} incidents, attempt {})", count, attempt),
                Err(ref e) => debug!("Refresh attempt {} failed: {}", attempt, e),
            }
            last = refreshed;
            delay = delay.saturating_mul(self.factor);
        }
        last
    }
}

/// Build the policy named in the configuration
pub fn from_config(config: &SettleConfig) -> Arc<dyn SettlePolicy> {
    match *config {
        SettleConfig::FixedDelay { delay_ms } => Arc::new(FixedDelay::new(Duration::from_millis(delay_ms))),
        SettleConfig::Backoff { initial_ms, factor, max_attempts } => Arc::new(BackoffPoller::new(
            Duration::from_millis(initial_ms),
            factor,
            max_attempts,
        )),
    }
}
