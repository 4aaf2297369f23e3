//! Per-account request limiting.
//!
//! The generation limiter is a fixed-window counter held in process memory.
//! State is lost on restart and is not shared between instances, which makes
//! the limiter advisory under horizontal scaling - an accepted property, not
//! a correctness target.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::config::LimitsConfig;
use crate::errors::{Error, Result};
use crate::types::UserId;

/// Container for all resource limiters.
#[derive(Debug, Default, Clone)]
pub struct Limiters {
    /// Limiter for generation requests. None means unlimited.
    pub generations: Option<Arc<GenerationRateLimiter>>,
}

impl Limiters {
    /// Creates all limiters from configuration.
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            generations: GenerationRateLimiter::new(config).map(Arc::new),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: DateTime<Utc>,
}

/// Fixed one-hour-window counter bounding generation requests per account.
///
/// On each request: a missing or expired entry starts a fresh window
/// (count = 1) and allows; otherwise the request is rejected once the
/// window's budget is spent, or counted and allowed.
#[derive(Debug)]
pub struct GenerationRateLimiter {
    windows: DashMap<UserId, Window>,
    max_per_window: u32,
    window: Duration,
}

impl GenerationRateLimiter {
    /// Creates a new limiter from configuration.
    ///
    /// If `generations_per_hour` is 0, returns `None` (unlimited).
    pub fn new(config: &LimitsConfig) -> Option<Self> {
        if config.generations_per_hour == 0 {
            return None;
        }

        Some(Self {
            windows: DashMap::new(),
            max_per_window: config.generations_per_hour,
            window: Duration::hours(1),
        })
    }

    /// Count one request for `user_id`, rejecting with `TooManyRequests`
    /// once the current window's budget is spent.
    pub fn check(&self, user_id: UserId) -> Result<()> {
        self.check_at(user_id, Utc::now())
    }

    fn check_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<()> {
        let mut entry = self.windows.entry(user_id).or_insert(Window {
            count: 0,
            resets_at: now + self.window,
        });

        if now >= entry.resets_at {
            // Window expired: start a fresh one
            *entry = Window {
                count: 1,
                resets_at: now + self.window,
            };
            return Ok(());
        }

        if entry.count >= self.max_per_window {
            return Err(Error::TooManyRequests {
                message: "Generation limit reached. Please try again later.".to_string(),
            });
        }

        entry.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_config(per_hour: u32) -> LimitsConfig {
        LimitsConfig {
            generations_per_hour: per_hour,
        }
    }

    #[test]
    fn test_unlimited_returns_none() {
        assert!(GenerationRateLimiter::new(&test_config(0)).is_none());
    }

    #[test]
    fn test_allows_up_to_budget_then_rejects() {
        let limiter = GenerationRateLimiter::new(&test_config(10)).unwrap();
        let user = Uuid::new_v4();
        let now = Utc::now();

        for _ in 0..10 {
            assert!(limiter.check_at(user, now).is_ok());
        }

        let rejected = limiter.check_at(user, now);
        assert!(matches!(rejected, Err(Error::TooManyRequests { .. })));
    }

    #[test]
    fn test_window_resets_after_an_hour() {
        let limiter = GenerationRateLimiter::new(&test_config(2)).unwrap();
        let user = Uuid::new_v4();
        let now = Utc::now();

        assert!(limiter.check_at(user, now).is_ok());
        assert!(limiter.check_at(user, now).is_ok());
        assert!(limiter.check_at(user, now).is_err());

        // One hour later the window is fresh
        let later = now + Duration::hours(1);
        assert!(limiter.check_at(user, later).is_ok());
        assert!(limiter.check_at(user, later).is_ok());
        assert!(limiter.check_at(user, later).is_err());
    }

    #[test]
    fn test_accounts_are_limited_independently() {
        let limiter = GenerationRateLimiter::new(&test_config(1)).unwrap();
        let now = Utc::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(limiter.check_at(first, now).is_ok());
        assert!(limiter.check_at(first, now).is_err());
        assert!(limiter.check_at(second, now).is_ok());
    }
}
