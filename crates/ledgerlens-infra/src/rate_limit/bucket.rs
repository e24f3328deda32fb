use chrono::{DateTime, Duration, Utc};

use ledgerlens_core::models::{RateDecision, RatePolicy};

/// Token bucket state for one key.
///
/// Tokens are whole units. Refill adds `floor(elapsed * rate)` and advances
/// `last_refill` only by the time those whole tokens represent, so sub-token
/// progress carries over to the next check.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    pub tokens: u32,
    pub last_refill: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl TokenBucket {
    /// A fresh bucket starts full.
    pub fn new(policy: RatePolicy, now: DateTime<Utc>) -> Self {
        Self {
            tokens: policy.capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    pub fn refill(&mut self, policy: RatePolicy, now: DateTime<Utc>) {
        if self.tokens >= policy.capacity {
            self.tokens = policy.capacity;
            self.last_refill = now;
            return;
        }
        if policy.refill_per_second <= 0.0 || now <= self.last_refill {
            return;
        }

        let elapsed_secs = micros_between(self.last_refill, now) as f64 / 1_000_000.0;
        let added = (elapsed_secs * policy.refill_per_second).floor();
        if added < 1.0 {
            return;
        }

        let headroom = (policy.capacity - self.tokens) as f64;
        if added >= headroom {
            self.tokens = policy.capacity;
            self.last_refill = now;
        } else {
            self.tokens += added as u32;
            let consumed_micros = (added / policy.refill_per_second * 1_000_000.0) as i64;
            self.last_refill += Duration::microseconds(consumed_micros);
        }
    }

    /// Refill, then take one token if available.
    pub fn check(&mut self, policy: RatePolicy, now: DateTime<Utc>) -> RateDecision {
        self.refill(policy, now);
        self.last_seen = now;

        let reset_at = now + seconds_per_token(policy);
        if self.tokens >= 1 {
            self.tokens -= 1;
            RateDecision {
                allowed: true,
                remaining: self.tokens,
                reset_at,
            }
        } else {
            RateDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            }
        }
    }

    pub fn is_idle(&self, idle_before: DateTime<Utc>) -> bool {
        self.last_seen < idle_before
    }
}

fn micros_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_microseconds().unwrap_or(i64::MAX)
}

fn seconds_per_token(policy: RatePolicy) -> Duration {
    if policy.refill_per_second <= 0.0 {
        return Duration::days(1);
    }
    let micros = (1_000_000.0 / policy.refill_per_second).round() as i64;
    Duration::microseconds(micros.max(1))
}
