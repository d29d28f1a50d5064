// src/algorithms/fixed_window.rs

use super::{CounterRecord, RecordKeys, Throttle, HITS_SUFFIX};
use crate::clock::Clock;
use crate::config::FixedWindowSettings;
use crate::error::Result;
use crate::storage::StorageBackend;
use crate::throttle_event;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Fixed Window throttling algorithm
///
/// Counts hits from the moment a window is opened. Once `window` seconds have
/// passed since that moment the count drops straight back to zero and the next
/// hit opens a new window at the current time.
#[derive(Debug)]
pub struct FixedWindowThrottler<S>
where
    S: StorageBackend,
{
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    key: String,
    record: RecordKeys,
    settings: FixedWindowSettings,
}

impl<S> FixedWindowThrottler<S>
where
    S: StorageBackend,
{
    pub fn new(
        storage: Arc<S>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        settings: FixedWindowSettings,
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

    /// The record as seen at `now`, with an elapsed window replaced by a fresh one
    async fn current_window(&self, now: u64) -> Result<CounterRecord> {
        match self.record.load(&*self.storage).await? {
            Some(record) if record.elapsed(now) < self.settings.window().as_secs() => Ok(record),
            Some(record) => {
                tracing::debug!(
                    key = %self.key,
                    stale_count = record.amount,
                    window_start = record.anchor,
                    "Fixed window expired"
                );
                Ok(CounterRecord::empty(now))
            }
            None => Ok(CounterRecord::empty(now)),
        }
    }

    async fn record_hit(&self, mut record: CounterRecord) -> Result<()> {
        record.amount += 1.0;
        self.record
            .store(&*self.storage, record, self.settings.window())
            .await
    }
}

#[async_trait]
impl<S> Throttle for FixedWindowThrottler<S>
where
    S: StorageBackend,
{
    async fn hit(&self) -> Result<Duration> {
        let record = self.current_window(self.clock.now()).await?;
        self.record_hit(record).await?;
        Ok(Duration::ZERO)
    }

    async fn access(&self) -> Result<bool> {
        let record = self.current_window(self.clock.now()).await?;
        let allowed = record.amount < self.settings.max_attempts() as f64;
        if allowed {
            self.record_hit(record).await?;
        }

        throttle_event!(
            self.algorithm(),
            self.key.as_str(),
            allowed,
            record.amount,
            self.settings.max_attempts()
        );
        Ok(allowed)
    }

    async fn check(&self) -> Result<bool> {
        Ok(self.count().await? < self.settings.max_attempts() as f64)
    }

    async fn count(&self) -> Result<f64> {
        Ok(self.current_window(self.clock.now()).await?.amount)
    }

    async fn clear(&self) -> Result<()> {
        let record = CounterRecord::empty(self.clock.now());
        self.record
            .store(&*self.storage, record, self.settings.window())
            .await
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn limit(&self) -> u64 {
        self.settings.max_attempts()
    }

    fn window(&self) -> Duration {
        self.settings.window()
    }

    fn algorithm(&self) -> &'static str {
        "fixed_window"
    }
}
