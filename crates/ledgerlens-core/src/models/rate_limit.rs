use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Bucket shape: how many tokens it holds and how fast they come back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePolicy {
    pub capacity: u32,
    pub refill_per_second: f64,
}

impl RatePolicy {
    /// `capacity` tokens refilled evenly over `window`
    pub fn per_window(capacity: u32, window: Duration) -> Self {
        let secs = window.num_milliseconds().max(1) as f64 / 1000.0;
        Self {
            capacity,
            refill_per_second: capacity as f64 / secs,
        }
    }

    pub fn per_minute(capacity: u32) -> Self {
        Self::per_window(capacity, Duration::minutes(1))
    }

    pub fn per_hour(capacity: u32) -> Self {
        Self::per_window(capacity, Duration::hours(1))
    }

    pub fn per_day(capacity: u32) -> Self {
        Self::per_window(capacity, Duration::days(1))
    }
}

/// Outcome of a single bucket check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// Whole seconds until `reset_at`, never below 1
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanScope {
    Ip,
    Email,
}

impl BanScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            BanScope::Ip => "ip",
            BanScope::Email => "email",
        }
    }
}

impl fmt::Display for BanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BanScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip" => Ok(BanScope::Ip),
            "email" => Ok(BanScope::Email),
            other => Err(format!("unknown ban scope: {}", other)),
        }
    }
}

/// A temporary block on an IP or a hashed email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
    pub scope: BanScope,
    /// IP address or email hash
    pub subject: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
}

impl BanEntry {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_refill_rates() {
        assert!((RatePolicy::per_minute(100).refill_per_second - 100.0 / 60.0).abs() < 1e-9);
        assert!((RatePolicy::per_hour(20).refill_per_second - 20.0 / 3600.0).abs() < 1e-9);
        assert_eq!(RatePolicy::per_day(3).capacity, 3);
    }

    #[test]
    fn test_retry_after_rounds_up_and_floors_at_one() {
        let now = Utc::now();
        let decision = RateDecision {
            allowed: false,
            remaining: 0,
            reset_at: now + Duration::milliseconds(1500),
        };
        assert_eq!(decision.retry_after_secs(now), 2);

        let past = RateDecision {
            reset_at: now - Duration::seconds(5),
            ..decision
        };
        assert_eq!(past.retry_after_secs(now), 1);
    }

    #[test]
    fn test_ban_scope_round_trips_through_str() {
        for scope in [BanScope::Ip, BanScope::Email] {
            assert_eq!(scope.as_str().parse::<BanScope>().unwrap(), scope);
        }
        assert!("tenant".parse::<BanScope>().is_err());
    }
}
