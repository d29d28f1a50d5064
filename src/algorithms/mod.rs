// src/algorithms/mod.rs

pub mod elastic_window;
pub mod factory;
pub mod fixed_window;
pub mod leaky_bucket;
pub mod moving_window;

#[cfg(test)]
mod tests;

pub use elastic_window::ElasticWindowThrottler;
pub use factory::ThrottlerFactory;
pub use fixed_window::FixedWindowThrottler;
pub use leaky_bucket::LeakyBucketThrottler;
pub use moving_window::MovingWindowThrottler;

use super::error::Result;
use super::storage::{decode_f64, decode_u64, encode_number, StorageBackend, StoragePipeline};
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Operations every throttling algorithm exposes.
///
/// Each call performs its own cache round trips and holds no state between
/// calls. Nothing here is atomic: two callers racing on one key can both read
/// the same record and both write, so counts may be lost and admissions may
/// exceed the limit.
#[async_trait]
pub trait Throttle: Send + Sync + Debug {
    /// Record one occurrence without consulting the limit.
    /// Returns how long the call was held back (zero unless the algorithm applies backpressure).
    async fn hit(&self) -> Result<Duration>;

    /// Record an occurrence only if the limit allows it
    async fn access(&self) -> Result<bool>;

    /// Whether the current count is below the limit
    async fn check(&self) -> Result<bool>;

    /// Current effective count after expiry or decay
    async fn count(&self) -> Result<f64>;

    /// Reset the record to zero at the current time
    async fn clear(&self) -> Result<()>;

    /// Cache key this throttler addresses
    fn key(&self) -> &str;

    /// Configured limit
    fn limit(&self) -> u64;

    /// Configured window
    fn window(&self) -> Duration;

    /// Algorithm name used in logs
    fn algorithm(&self) -> &'static str;
}

/// A counter as it lives in the cache: an amount and the epoch second it was
/// last anchored at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterRecord {
    pub amount: f64,
    pub anchor: u64,
}

impl CounterRecord {
    /// The empty baseline stamped at `now`
    pub fn empty(now: u64) -> Self {
        Self {
            amount: 0.0,
            anchor: now,
        }
    }

    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.anchor)
    }
}

/// Amount drained after `elapsed` seconds at `limit` per `window`, clamped at zero
pub(crate) fn decay(amount: f64, elapsed: u64, limit: u64, window: Duration) -> f64 {
    let window_secs = window.as_secs().max(1) as f64;
    // multiply before dividing so whole-number results stay exact
    let drained = elapsed as f64 * limit as f64 / window_secs;
    (amount - drained).max(0.0)
}

/// Cache keys of a two-field record, e.g. `{key}:hits` and `{key}:time`
#[derive(Debug, Clone)]
pub(crate) struct RecordKeys {
    amount: String,
    time: String,
}

impl RecordKeys {
    pub(crate) fn new(key: &str, amount_suffix: &str) -> Self {
        Self {
            amount: format!("{}{}", key, amount_suffix),
            time: format!("{}{}", key, TIME_SUFFIX),
        }
    }

    /// Read both fields in one round trip. A record without a timestamp is
    /// treated as absent; a missing amount next to a timestamp reads as zero.
    pub(crate) async fn load<S: StorageBackend>(&self, storage: &S) -> Result<Option<CounterRecord>> {
        let mut pipeline = storage.pipeline();
        pipeline.get(&self.amount).get(&self.time);
        let mut slots = storage.execute_pipeline(pipeline).await?.into_iter();

        let amount = slots.next().flatten();
        let Some(time) = slots.next().flatten() else {
            return Ok(None);
        };

        let anchor = decode_u64(&self.time, &time)?;
        let amount = match amount {
            Some(bytes) => decode_f64(&self.amount, &bytes)?.max(0.0),
            None => 0.0,
        };

        Ok(Some(CounterRecord { amount, anchor }))
    }

    /// Write both fields in one round trip with the same TTL
    pub(crate) async fn store<S: StorageBackend>(
        &self,
        storage: &S,
        record: CounterRecord,
        ttl: Duration,
    ) -> Result<()> {
        let mut pipeline = storage.pipeline();
        pipeline
            .set(&self.amount, &encode_number(record.amount), Some(ttl))
            .set(&self.time, &encode_number(record.anchor), Some(ttl));
        storage.execute_pipeline(pipeline).await?;
        Ok(())
    }
}

pub(crate) const HITS_SUFFIX: &str = ":hits";
pub(crate) const TOKENS_SUFFIX: &str = ":tokens";
pub(crate) const TIME_SUFFIX: &str = ":time";

/// One of the four throttling algorithms, bound to a key
#[derive(Debug)]
pub enum Throttler<S: StorageBackend> {
    FixedWindow(FixedWindowThrottler<S>),
    ElasticWindow(ElasticWindowThrottler<S>),
    MovingWindow(MovingWindowThrottler<S>),
    LeakyBucket(LeakyBucketThrottler<S>),
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $call:expr) => {
        match $self {
            Throttler::FixedWindow($inner) => $call,
            Throttler::ElasticWindow($inner) => $call,
            Throttler::MovingWindow($inner) => $call,
            Throttler::LeakyBucket($inner) => $call,
        }
    };
}

#[async_trait]
impl<S: StorageBackend> Throttle for Throttler<S> {
    async fn hit(&self) -> Result<Duration> {
        dispatch!(self, t => t.hit().await)
    }

    async fn access(&self) -> Result<bool> {
        dispatch!(self, t => t.access().await)
    }

    async fn check(&self) -> Result<bool> {
        dispatch!(self, t => t.check().await)
    }

    async fn count(&self) -> Result<f64> {
        dispatch!(self, t => t.count().await)
    }

    async fn clear(&self) -> Result<()> {
        dispatch!(self, t => t.clear().await)
    }

    fn key(&self) -> &str {
        dispatch!(self, t => t.key())
    }

    fn limit(&self) -> u64 {
        dispatch!(self, t => t.limit())
    }

    fn window(&self) -> Duration {
        dispatch!(self, t => t.window())
    }

    fn algorithm(&self) -> &'static str {
        dispatch!(self, t => t.algorithm())
    }
}
