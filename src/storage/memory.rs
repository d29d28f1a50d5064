// src/storage/memory.rs

// In-memory storage (for testing and single-process usage)
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::task;
use tokio::time;

use crate::config::InMemoryConfig;
use crate::error::{Result, StorageError};
use crate::storage::{StorageBackend, StoragePipeline};

type Entries = Arc<RwLock<HashMap<String, MemoryEntry>>>;

/// A simple pipeline implementation for in-memory storage
#[derive(Default)]
pub struct MemoryPipeline {
    operations: Vec<MemoryOperation>,
}

/// Represents an operation in the memory pipeline
enum MemoryOperation {
    Get(String),
    Set(String, Vec<u8>, Option<Duration>),
}

impl StoragePipeline for MemoryPipeline {
    fn get(&mut self, key: &str) -> &mut Self {
        self.operations.push(MemoryOperation::Get(key.to_string()));
        self
    }

    fn set(&mut self, key: &str, value: &[u8], ttl: Option<Duration>) -> &mut Self {
        self.operations
            .push(MemoryOperation::Set(key.to_string(), value.to_vec(), ttl));
        self
    }
}

/// Entry in the in-memory storage
#[derive(Debug)]
struct MemoryEntry {
    value: Vec<u8>,
    expiry: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expiry.map_or(true, |expiry| expiry > now)
    }
}

/// In-memory storage backend implementation
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    data: Entries,
    config: InMemoryConfig,
}

impl MemoryStorage {
    /// Creates a new in-memory storage with the given configuration.
    ///
    /// The background sweep is only started when called inside a tokio
    /// runtime; expired entries are otherwise dropped lazily on access.
    pub fn new(config: InMemoryConfig) -> Self {
        let data: Entries = Arc::new(RwLock::new(HashMap::with_capacity(
            config.max_entries.min(10_000),
        )));

        if config.use_background_task && tokio::runtime::Handle::try_current().is_ok() {
            let weak = Arc::downgrade(&data);
            let period = config.cleanup_interval;

            task::spawn(async move {
                let mut interval = time::interval(period);
                loop {
                    interval.tick().await;
                    // Stop once every handle to the storage has been dropped
                    let Some(data) = weak.upgrade() else { break };
                    if let Err(err) = Self::cleanup_expired_entries(&data) {
                        tracing::warn!(error = %err, "In-memory cleanup failed");
                        break;
                    }
                }
            });
        }

        Self { data, config }
    }

    /// Clean up expired entries
    fn cleanup_expired_entries(data: &Entries) -> Result<usize> {
        let now = Instant::now();
        let mut data = write_lock(data)?;
        let before = data.len();
        data.retain(|_, entry| entry.is_live(now));

        let removed = before - data.len();
        if removed > 0 {
            tracing::trace!(removed, "Removed expired in-memory entries");
        }
        Ok(removed)
    }

    /// Number of entries currently held, including expired ones not yet swept
    pub fn len(&self) -> Result<usize> {
        Ok(read_lock(&self.data)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Look up a live entry, removing it if it has expired
    fn live_value(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        {
            let data = read_lock(&self.data)?;
            match data.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Key is expired, take the write lock to remove it
        let mut data = write_lock(&self.data)?;
        if data.get(key).is_some_and(|entry| !entry.is_live(now)) {
            data.remove(key);
        }
        Ok(None)
    }

    fn store(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut data = write_lock(&self.data)?;

        // Expired entries never count against the limit, swept or not
        if data.len() >= self.config.max_entries && !data.contains_key(key) {
            let now = Instant::now();
            data.retain(|_, entry| entry.is_live(now));
        }

        // Apply max entries limit
        if data.len() >= self.config.max_entries && !data.contains_key(key) {
            return Err(StorageError::CapacityExceeded(format!(
                "maximum of {} entries reached",
                self.config.max_entries
            ))
            .into());
        }

        let expiry = ttl.map(|duration| Instant::now() + duration);
        data.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expiry,
            },
        );

        Ok(())
    }
}

fn read_lock(data: &Entries) -> Result<RwLockReadGuard<'_, HashMap<String, MemoryEntry>>> {
    data.read()
        .map_err(|e| StorageError::LockPoisoned(e.to_string()).into())
}

fn write_lock(data: &Entries) -> Result<RwLockWriteGuard<'_, HashMap<String, MemoryEntry>>> {
    data.write()
        .map_err(|e| StorageError::LockPoisoned(e.to_string()).into())
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    type Config = InMemoryConfig;
    type Pipeline = MemoryPipeline;

    async fn new(config: Self::Config) -> Result<Self> {
        Ok(Self::new(config))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.live_value(key)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.store(key, value, ttl)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(key)?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut data = write_lock(&self.data)?;
        Ok(data.remove(key).is_some())
    }

    fn pipeline(&self) -> Self::Pipeline {
        MemoryPipeline::default()
    }

    async fn execute_pipeline(&self, pipeline: Self::Pipeline) -> Result<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::with_capacity(pipeline.operations.len());

        for op in pipeline.operations {
            match op {
                MemoryOperation::Get(key) => {
                    results.push(self.live_value(&key)?);
                }
                MemoryOperation::Set(key, value, ttl) => {
                    self.store(&key, &value, ttl)?;
                    results.push(None);
                }
            }
        }

        Ok(results)
    }
}
