// src/algorithms/leaky_bucket.rs

use super::{decay, CounterRecord, RecordKeys, Throttle, TOKENS_SUFFIX};
use crate::clock::Clock;
use crate::config::LeakyBucketSettings;
use crate::error::Result;
use crate::storage::StorageBackend;
use crate::throttle_event;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Leaky Bucket throttling algorithm
///
/// The bucket fills by one token per hit and leaks `token_limit / window`
/// tokens per second. Hits that raise the level above `threshold` are not
/// refused; they are held back for `window / (token_limit - threshold)`
/// seconds before returning, which spreads a burst out instead of failing it.
/// A request is only denied by [`Throttle::access`] once the bucket is full.
#[derive(Debug)]
pub struct LeakyBucketThrottler<S>
where
    S: StorageBackend,
{
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    key: String,
    record: RecordKeys,
    settings: LeakyBucketSettings,
}

impl<S> LeakyBucketThrottler<S>
where
    S: StorageBackend,
{
    pub fn new(
        storage: Arc<S>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        settings: LeakyBucketSettings,
    ) -> Self {
        let key = key.into();
        Self {
            record: RecordKeys::new(&key, TOKENS_SUFFIX),
            storage,
            clock,
            key,
            settings,
        }
    }

    /// Seconds a hit above the threshold is held back
    pub fn wait_time(&self) -> f64 {
        let drain_slots = self
            .settings
            .token_limit()
            .saturating_sub(self.settings.threshold())
            .max(1);
        self.settings.window().as_secs() as f64 / drain_slots as f64
    }

    /// Fill level of `record` at `now`; a bucket left alone for a full window is empty
    fn level(&self, record: &CounterRecord, now: u64) -> f64 {
        let elapsed = record.elapsed(now);
        if elapsed >= self.settings.window().as_secs() {
            return 0.0;
        }
        decay(
            record.amount,
            elapsed,
            self.settings.token_limit(),
            self.settings.window(),
        )
    }

    async fn store(&self, record: CounterRecord) -> Result<()> {
        self.record
            .store(&*self.storage, record, self.settings.cache_ttl())
            .await
    }

    /// Add one token on top of `level` and apply backpressure past the threshold
    async fn fill(&self, level: f64, now: u64) -> Result<Duration> {
        let new_level = level + 1.0;
        self.store(CounterRecord {
            amount: new_level,
            anchor: now,
        })
        .await?;

        if new_level <= self.settings.threshold() as f64 {
            return Ok(Duration::ZERO);
        }

        let wait = self.wait_time();
        tracing::warn!(
            key = %self.key,
            level = new_level,
            threshold = self.settings.threshold(),
            wait_seconds = wait,
            "Leaky bucket above threshold, applying backpressure"
        );
        self.clock.usleep((wait * 1_000_000.0).round() as u64).await;

        Ok(Duration::from_secs_f64(wait))
    }
}

#[async_trait]
impl<S> Throttle for LeakyBucketThrottler<S>
where
    S: StorageBackend,
{
    async fn hit(&self) -> Result<Duration> {
        let now = self.clock.now();
        let level = match self.record.load(&*self.storage).await? {
            Some(record) => self.level(&record, now),
            None => 0.0,
        };
        self.fill(level, now).await
    }

    async fn access(&self) -> Result<bool> {
        let now = self.clock.now();
        let record = self.record.load(&*self.storage).await?;

        // A full window of silence drains any bucket, so admit unconditionally
        if let Some(record) = record.filter(|r| r.elapsed(now) >= self.settings.window().as_secs())
        {
            tracing::debug!(key = %self.key, stale_level = record.amount, "Leaky bucket drained");
            self.store(CounterRecord {
                amount: 1.0,
                anchor: now,
            })
            .await?;
            throttle_event!(
                self.algorithm(),
                self.key.as_str(),
                true,
                0.0,
                self.settings.token_limit()
            );
            return Ok(true);
        }

        let level = record.map_or(0.0, |r| self.level(&r, now));
        let allowed = level < self.settings.token_limit() as f64;
        if allowed {
            self.fill(level, now).await?;
        }

        throttle_event!(
            self.algorithm(),
            self.key.as_str(),
            allowed,
            level,
            self.settings.token_limit()
        );
        Ok(allowed)
    }

    async fn check(&self) -> Result<bool> {
        Ok(self.count().await? < self.settings.token_limit() as f64)
    }

    async fn count(&self) -> Result<f64> {
        let now = self.clock.now();
        match self.record.load(&*self.storage).await? {
            Some(record) => Ok(self.level(&record, now)),
            None => {
                tracing::debug!(key = %self.key, "Leaky bucket missing, persisting empty record");
                self.store(CounterRecord::empty(now)).await?;
                Ok(0.0)
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        self.store(CounterRecord::empty(self.clock.now())).await
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn limit(&self) -> u64 {
        self.settings.token_limit()
    }

    fn window(&self) -> Duration {
        self.settings.window()
    }

    fn algorithm(&self) -> &'static str {
        "leaky_bucket"
    }
}
