// src/algorithms/moving_window.rs

use super::{decay, CounterRecord, RecordKeys, Throttle, HITS_SUFFIX};
use crate::clock::Clock;
use crate::config::MovingWindowSettings;
use crate::error::Result;
use crate::storage::StorageBackend;
use crate::throttle_event;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Moving Window throttling algorithm
///
/// Instead of resetting at a window boundary the stored count drains linearly
/// at `hit_limit / window` per second, measured from the last hit.
#[derive(Debug)]
pub struct MovingWindowThrottler<S>
where
    S: StorageBackend,
{
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    key: String,
    record: RecordKeys,
    settings: MovingWindowSettings,
}

impl<S> MovingWindowThrottler<S>
where
    S: StorageBackend,
{
    pub fn new(
        storage: Arc<S>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        settings: MovingWindowSettings,
    ) -> Self {
        let key = key.into();
        Self {
            record: RecordKeys::new(&key, HITS_SUFFIX),
            storage,
            clock,
            key,
            settings,
        }
    }

    /// Decayed count at `now`
    async fn decayed_count(&self, now: u64) -> Result<f64> {
        let Some(record) = self.record.load(&*self.storage).await? else {
            return Ok(0.0);
        };

        let count = decay(
            record.amount,
            record.elapsed(now),
            self.settings.hit_limit(),
            self.settings.window(),
        );
        tracing::trace!(key = %self.key, stored = record.amount, count, "Moving window decayed");
        Ok(count)
    }

    async fn record_hit(&self, count: f64, now: u64) -> Result<()> {
        let record = CounterRecord {
            amount: count + 1.0,
            anchor: now,
        };
        self.record
            .store(&*self.storage, record, self.settings.cache_ttl())
            .await
    }
}

#[async_trait]
impl<S> Throttle for MovingWindowThrottler<S>
where
    S: StorageBackend,
{
    async fn hit(&self) -> Result<Duration> {
        let now = self.clock.now();
        let count = self.decayed_count(now).await?;
        self.record_hit(count, now).await?;
        Ok(Duration::ZERO)
    }

    async fn access(&self) -> Result<bool> {
        let now = self.clock.now();
        let count = self.decayed_count(now).await?;
        let allowed = count < self.settings.hit_limit() as f64;
        if allowed {
            self.record_hit(count, now).await?;
        }

        throttle_event!(
            self.algorithm(),
            self.key.as_str(),
            allowed,
            count,
            self.settings.hit_limit()
        );
        Ok(allowed)
    }

    async fn check(&self) -> Result<bool> {
        Ok(self.count().await? < self.settings.hit_limit() as f64)
    }

    async fn count(&self) -> Result<f64> {
        self.decayed_count(self.clock.now()).await
    }

    async fn clear(&self) -> Result<()> {
        let record = CounterRecord::empty(self.clock.now());
        self.record
            .store(&*self.storage, record, self.settings.cache_ttl())
            .await
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn limit(&self) -> u64 {
        self.settings.hit_limit()
    }

    fn window(&self) -> Duration {
        self.settings.window()
    }

    fn algorithm(&self) -> &'static str {
        "moving_window"
    }
}
