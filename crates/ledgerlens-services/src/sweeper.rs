use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::time::interval;

use ledgerlens_infra::{with_store_timeout, RateLimiter};

use crate::sessions::SessionStore;
use crate::verification::VerificationGate;

/// Counts removed by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub challenges: usize,
    pub buckets: usize,
    pub bans: usize,
}

const MIN_PERIOD: StdDuration = StdDuration::from_secs(1);

/// Periodically purges expired sessions and challenges, idle buckets and expired bans.
#[derive(Clone)]
pub struct RetentionSweeper {
    sessions: Arc<dyn SessionStore>,
    gate: VerificationGate,
    limiter: RateLimiter,
    every: StdDuration,
    store_timeout: StdDuration,
}

impl RetentionSweeper {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        gate: VerificationGate,
        limiter: RateLimiter,
        every: StdDuration,
        store_timeout: StdDuration,
    ) -> Self {
        Self {
            sessions,
            gate,
            limiter,
            // tokio's interval panics on a zero period
            every: every.max(MIN_PERIOD),
            store_timeout,
        }
    }

    pub fn period(&self) -> StdDuration {
        self.every
    }

    /// Start the background sweep loop.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.every);

            loop {
                ticker.tick().await;
                let report = self.sweep_once(Utc::now()).await;
                tracing::debug!(?report, "Retention sweep completed");
            }
        })
    }

    /// One pass over every store. A failing store is logged and skipped.
    #[tracing::instrument(skip(self), fields(sweep.operation = "expire_all"))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        let sessions =
            match with_store_timeout(self.store_timeout, self.sessions.purge_expired(now)).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to purge expired sessions");
                    0
                }
            };

        let challenges = match self.gate.purge_expired(now).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to purge expired challenges");
                0
            }
        };

        let (buckets, bans) = match self.limiter.sweep(now).await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!(error = %e, "Failed to sweep rate limit state");
                (0, 0)
            }
        };

        let report = SweepReport {
            sessions,
            challenges,
            buckets,
            bans,
        };
        if report != SweepReport::default() {
            tracing::info!(sessions, challenges, buckets, bans, "Expired state purged");
        }
        report
    }
}
