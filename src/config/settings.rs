// src/config/settings.rs

//! Parameter bundles for the four throttling algorithms.
//!
//! Settings are immutable once built. Windows and TTLs have whole-second
//! resolution; a missing `cache_ttl` falls back to the window so a record is
//! never evicted by the cache while its window is still open.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::duration_secs;
use crate::error::{Result, ThrottleError};

/// Settings for the fixed window algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWindowSettings {
    max_attempts: u64,

    #[serde(with = "duration_secs")]
    window: Duration,
}

impl FixedWindowSettings {
    pub fn new(max_attempts: u64, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn validate(&self) -> Result<()> {
        check_limit("max_attempts", self.max_attempts)?;
        check_window(self.window)
    }
}

/// Settings for the elastic window algorithm. The window doubles as the
/// record's cache TTL, refreshed on every hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticWindowSettings {
    max_attempts: u64,

    #[serde(with = "duration_secs")]
    window: Duration,
}

impl ElasticWindowSettings {
    pub fn new(max_attempts: u64, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn validate(&self) -> Result<()> {
        check_limit("max_attempts", self.max_attempts)?;
        check_window(self.window)
    }
}

/// Settings for the moving window algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingWindowSettings {
    hit_limit: u64,

    #[serde(with = "duration_secs")]
    window: Duration,

    #[serde(default, with = "duration_secs::option")]
    cache_ttl: Option<Duration>,
}

impl MovingWindowSettings {
    pub fn new(hit_limit: u64, window: Duration) -> Self {
        Self {
            hit_limit,
            window,
            cache_ttl: None,
        }
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = Some(cache_ttl);
        self
    }

    pub fn hit_limit(&self) -> u64 {
        self.hit_limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl.unwrap_or(self.window)
    }

    pub fn validate(&self) -> Result<()> {
        check_limit("hit_limit", self.hit_limit)?;
        check_window(self.window)?;
        check_cache_ttl(self.cache_ttl(), self.window)
    }
}

/// Settings for the leaky bucket algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakyBucketSettings {
    token_limit: u64,

    #[serde(with = "duration_secs")]
    window: Duration,

    /// Fill level above which hits are slowed down
    threshold: u64,

    #[serde(default, with = "duration_secs::option")]
    cache_ttl: Option<Duration>,
}

impl LeakyBucketSettings {
    pub fn new(token_limit: u64, window: Duration, threshold: u64) -> Self {
        Self {
            token_limit,
            window,
            threshold,
            cache_ttl: None,
        }
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = Some(cache_ttl);
        self
    }

    pub fn token_limit(&self) -> u64 {
        self.token_limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl.unwrap_or(self.window)
    }

    pub fn validate(&self) -> Result<()> {
        check_limit("token_limit", self.token_limit)?;
        check_window(self.window)?;
        check_cache_ttl(self.cache_ttl(), self.window)?;

        if self.threshold > self.token_limit {
            return Err(ThrottleError::InvalidSettings(format!(
                "threshold ({}) must not exceed token_limit ({})",
                self.threshold, self.token_limit
            )));
        }

        Ok(())
    }
}

/// The closed set of algorithms a rate limiter can be configured with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ThrottleSettings {
    FixedWindow(FixedWindowSettings),
    ElasticWindow(ElasticWindowSettings),
    MovingWindow(MovingWindowSettings),
    LeakyBucket(LeakyBucketSettings),
}

impl ThrottleSettings {
    pub fn algorithm(&self) -> &'static str {
        match self {
            ThrottleSettings::FixedWindow(_) => "fixed_window",
            ThrottleSettings::ElasticWindow(_) => "elastic_window",
            ThrottleSettings::MovingWindow(_) => "moving_window",
            ThrottleSettings::LeakyBucket(_) => "leaky_bucket",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ThrottleSettings::FixedWindow(settings) => settings.validate(),
            ThrottleSettings::ElasticWindow(settings) => settings.validate(),
            ThrottleSettings::MovingWindow(settings) => settings.validate(),
            ThrottleSettings::LeakyBucket(settings) => settings.validate(),
        }
    }
}

impl From<FixedWindowSettings> for ThrottleSettings {
    fn from(settings: FixedWindowSettings) -> Self {
        ThrottleSettings::FixedWindow(settings)
    }
}

impl From<ElasticWindowSettings> for ThrottleSettings {
    fn from(settings: ElasticWindowSettings) -> Self {
        ThrottleSettings::ElasticWindow(settings)
    }
}

impl From<MovingWindowSettings> for ThrottleSettings {
    fn from(settings: MovingWindowSettings) -> Self {
        ThrottleSettings::MovingWindow(settings)
    }
}

impl From<LeakyBucketSettings> for ThrottleSettings {
    fn from(settings: LeakyBucketSettings) -> Self {
        ThrottleSettings::LeakyBucket(settings)
    }
}

fn check_limit(name: &str, limit: u64) -> Result<()> {
    if limit == 0 {
        return Err(ThrottleError::InvalidSettings(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(())
}

fn check_window(window: Duration) -> Result<()> {
    if window.as_secs() == 0 {
        return Err(ThrottleError::InvalidSettings(
            "window must be at least one second".to_string(),
        ));
    }
    Ok(())
}

fn check_cache_ttl(cache_ttl: Duration, window: Duration) -> Result<()> {
    if cache_ttl < window {
        return Err(ThrottleError::InvalidSettings(format!(
            "cache_ttl ({}s) is shorter than the window ({}s)",
            cache_ttl.as_secs(),
            window.as_secs()
        )));
    }
    Ok(())
}
