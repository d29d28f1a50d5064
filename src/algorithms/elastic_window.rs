// src/algorithms/elastic_window.rs

use super::Throttle;
use crate::config::ElasticWindowSettings;
use crate::error::Result;
use crate::storage::{decode_u64, encode_number, StorageBackend};
use crate::throttle_event;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Elastic Window throttling algorithm
///
/// Keeps a bare counter and leaves expiry to the cache: every hit rewrites the
/// counter with a TTL of one window, so the window restarts on each occurrence
/// and the record disappears after a full window of silence.
#[derive(Debug)]
pub struct ElasticWindowThrottler<S>
where
    S: StorageBackend,
{
    storage: Arc<S>,
    key: String,
    settings: ElasticWindowSettings,
}

impl<S> ElasticWindowThrottler<S>
where
    S: StorageBackend,
{
    pub fn new(storage: Arc<S>, key: impl Into<String>, settings: ElasticWindowSettings) -> Self {
        Self {
            storage,
            key: key.into(),
            settings,
        }
    }

    async fn stored_count(&self) -> Result<u64> {
        match self.storage.get(&self.key).await? {
            Some(bytes) => decode_u64(&self.key, &bytes),
            None => Ok(0),
        }
    }

    async fn store_count(&self, count: u64) -> Result<()> {
        self.storage
            .set(&self.key, &encode_number(count), Some(self.settings.window()))
            .await
    }
}

#[async_trait]
impl<S> Throttle for ElasticWindowThrottler<S>
where
    S: StorageBackend,
{
    async fn hit(&self) -> Result<Duration> {
        let count = self.stored_count().await?;
        self.store_count(count + 1).await?;
        Ok(Duration::ZERO)
    }

    async fn access(&self) -> Result<bool> {
        let count = self.stored_count().await?;
        let allowed = count < self.settings.max_attempts();
        if allowed {
            self.store_count(count + 1).await?;
        }

        throttle_event!(
            self.algorithm(),
            self.key.as_str(),
            allowed,
            count,
            self.settings.max_attempts()
        );
        Ok(allowed)
    }

    async fn check(&self) -> Result<bool> {
        Ok(self.stored_count().await? < self.settings.max_attempts())
    }

    async fn count(&self) -> Result<f64> {
        Ok(self.stored_count().await? as f64)
    }

    async fn clear(&self) -> Result<()> {
        self.store_count(0).await
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
        "elastic_window"
    }
}
