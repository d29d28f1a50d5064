// src/algorithms/factory.rs

use super::{
    ElasticWindowThrottler, FixedWindowThrottler, LeakyBucketThrottler, MovingWindowThrottler,
    Throttler,
};
use crate::clock::{Clock, SystemClock};
use crate::config::ThrottleSettings;
use crate::error::Result;
use crate::storage::StorageBackend;
use std::fmt;
use std::sync::Arc;

/// Builds the throttler matching a settings value, bound to one storage
/// backend and one clock
pub struct ThrottlerFactory<S>
where
    S: StorageBackend,
{
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> fmt::Debug for ThrottlerFactory<S>
where
    S: StorageBackend,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottlerFactory")
            .field("storage", &self.storage)
            .field("clock", &self.clock)
            .finish()
    }
}

impl<S> Clone for ThrottlerFactory<S>
where
    S: StorageBackend,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S> ThrottlerFactory<S>
where
    S: StorageBackend,
{
    /// Factory using the wall clock
    pub fn new(storage: S) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    /// Factory using an injected clock, e.g. a virtual one in tests
    pub fn with_clock(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: Arc::new(storage),
            clock,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Validate `settings` and construct the matching throttler for `key`
    pub fn make(&self, key: impl Into<String>, settings: &ThrottleSettings) -> Result<Throttler<S>> {
        settings.validate()?;

        let storage = Arc::clone(&self.storage);
        let clock = Arc::clone(&self.clock);

        let throttler = match settings {
            ThrottleSettings::FixedWindow(settings) => Throttler::FixedWindow(
                FixedWindowThrottler::new(storage, clock, key, settings.clone()),
            ),
            ThrottleSettings::ElasticWindow(settings) => Throttler::ElasticWindow(
                ElasticWindowThrottler::new(storage, key, settings.clone()),
            ),
            ThrottleSettings::MovingWindow(settings) => Throttler::MovingWindow(
                MovingWindowThrottler::new(storage, clock, key, settings.clone()),
            ),
            ThrottleSettings::LeakyBucket(settings) => Throttler::LeakyBucket(
                LeakyBucketThrottler::new(storage, clock, key, settings.clone()),
            ),
        };

        Ok(throttler)
    }
}
