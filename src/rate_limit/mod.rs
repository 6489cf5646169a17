//! Per-user daily quota for video generation.
//!
//! Counts live in process memory under `"<userId>-<YYYY-MM-DD>"` keys, so a
//! restart forgets every quota. Keys from earlier days never match a lookup;
//! [`DailyRateLimiter::sweep`] drops them at UTC midnight.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub daily_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { daily_limit: 3 }
    }
}

pub struct DailyRateLimiter {
    counts: Arc<RwLock<HashMap<String, u32>>>,
    config: RateLimitConfig,
}

fn day_key(user_id: i32, now: DateTime<Utc>) -> String {
    format!("{}-{}", user_id, clock::utc_day_key(now))
}

impl DailyRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            counts: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.config.daily_limit
    }

    /// Consumes one unit of today's quota. Returns false once the user has
    /// already used the whole allowance.
    pub async fn check_limit(&self, user_id: i32) -> bool {
        self.check_limit_at(user_id, Utc::now()).await
    }

    pub async fn check_limit_at(&self, user_id: i32, now: DateTime<Utc>) -> bool {
        let mut counts = self.counts.write().await;
        let count = counts.entry(day_key(user_id, now)).or_insert(0);

        if *count >= self.config.daily_limit {
            debug!("User {} is over the daily limit ({})", user_id, count);
            return false;
        }

        *count += 1;
        true
    }

    pub async fn remaining(&self, user_id: i32) -> u32 {
        self.remaining_at(user_id, Utc::now()).await
    }

    pub async fn remaining_at(&self, user_id: i32, now: DateTime<Utc>) -> u32 {
        let used = self
            .counts
            .read()
            .await
            .get(&day_key(user_id, now))
            .copied()
            .unwrap_or(0);

        self.config.daily_limit.saturating_sub(used)
    }

    /// Drops counters that belong to any day other than the one containing `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let suffix = format!("-{}", clock::utc_day_key(now));
        let mut counts = self.counts.write().await;
        let before = counts.len();
        counts.retain(|key, _| key.ends_with(&suffix));
        before - counts.len()
    }

    /// Sweeps at every UTC midnight, forever.
    pub async fn run_midnight_sweep(self: Arc<Self>) {
        loop {
            tokio::time::sleep(clock::until_next_utc_midnight(Utc::now())).await;
            // land safely inside the new day
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            let dropped = self.sweep(Utc::now()).await;
            info!("Daily quota sweep dropped {} stale counters", dropped);
        }
    }
}
