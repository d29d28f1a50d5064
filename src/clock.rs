// src/clock.rs

//! Time source consumed by the throttlers.
//!
//! Every throttler is handed an explicit clock at construction. Production code
//! uses [`SystemClock`]; tests inject a virtual clock so decay and expiry can be
//! asserted without waiting.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Clock adapter contract
#[async_trait]
pub trait Clock: Send + Sync + Debug {
    /// Current time as whole epoch seconds
    fn now(&self) -> u64;

    /// Suspend the calling task for the given number of seconds
    async fn sleep(&self, seconds: u64);

    /// Suspend the calling task for the given number of microseconds
    async fn usleep(&self, microseconds: u64);
}

/// Wall clock backed by `chrono` and the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }

    async fn sleep(&self, seconds: u64) {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }

    async fn usleep(&self, microseconds: u64) {
        tokio::time::sleep(Duration::from_micros(microseconds)).await;
    }
}
