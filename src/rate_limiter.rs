// src/rate_limiter.rs

use serde_json::Value;

use crate::algorithms::{Throttle, Throttler, ThrottlerFactory};
use crate::config::{RateLimiterConfig, ThrottleSettings};
use crate::error::Result;
use crate::hydrator::HydratorFactory;
use crate::storage::StorageBackend;

/// Entry point: turns identifying data into a ready-to-use throttler.
///
/// Throttlers are built fresh on every [`RateLimiter::get`]; two throttlers for
/// the same identifier share state only through the cache key they address.
#[derive(Debug, Clone)]
pub struct RateLimiter<S>
where
    S: StorageBackend,
{
    factory: ThrottlerFactory<S>,
    hydrators: HydratorFactory,
    settings: ThrottleSettings,
}

impl<S> RateLimiter<S>
where
    S: StorageBackend,
{
    pub fn new(
        factory: ThrottlerFactory<S>,
        hydrators: HydratorFactory,
        settings: impl Into<ThrottleSettings>,
    ) -> Self {
        Self {
            factory,
            hydrators,
            settings: settings.into(),
        }
    }

    pub fn from_config(factory: ThrottlerFactory<S>, config: &RateLimiterConfig) -> Self {
        Self::new(
            factory,
            HydratorFactory::new(config.key_prefix.clone()),
            config.settings.clone(),
        )
    }

    pub fn settings(&self) -> &ThrottleSettings {
        &self.settings
    }

    /// Build a throttler for `data`: a string, or a JSON object/array of attributes
    pub fn get(&self, data: impl Into<Value>) -> Result<Throttler<S>> {
        let data = data.into();
        let key = self.hydrators.hydrate(&data)?;
        let throttler = self.factory.make(key, &self.settings)?;

        tracing::trace!(
            algorithm = throttler.algorithm(),
            key = throttler.key(),
            "Throttler ready"
        );
        Ok(throttler)
    }
}
