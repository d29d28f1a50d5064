// library entry
pub mod algorithms;
pub mod clock;
pub mod config;
pub mod error;
pub mod hydrator;
pub mod logging;
pub mod rate_limiter;
pub mod storage;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

// Re-export key components for convenience
pub use algorithms::{Throttle, Throttler, ThrottlerFactory};
pub use clock::{Clock, SystemClock};
pub use config::{
    ElasticWindowSettings, FixedWindowSettings, LeakyBucketSettings, MovingWindowSettings,
    RateLimiterConfig, ThrottleSettings,
};
pub use error::{Result, StorageError, ThrottleError};
pub use hydrator::{Hydrator, HydratorFactory};
pub use logging::init as init_logging;
pub use rate_limiter::RateLimiter;
pub use storage::{StorageBackend, StoragePipeline};
