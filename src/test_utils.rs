// src/test_utils.rs

use super::algorithms::{Throttle, ThrottlerFactory};
use super::clock::Clock;
use super::config::ThrottleSettings;
use super::error::Result;
use super::hydrator::HydratorFactory;
use super::storage::{StorageBackend, StoragePipeline};
use super::RateLimiter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Virtual clock. Time only moves when a test moves it; sleeps are recorded
/// rather than performed.
#[derive(Debug, Default)]
pub struct MockClock {
    now: AtomicU64,
    sleeps: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn new(start: u64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicU64::new(start),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, seconds: u64) {
        self.sleeps.lock().unwrap().push(Duration::from_secs(seconds));
    }

    async fn usleep(&self, microseconds: u64) {
        self.sleeps
            .lock()
            .unwrap()
            .push(Duration::from_micros(microseconds));
    }
}

/// A cache call as observed by [`MockStorage`]
#[derive(Debug, Clone, PartialEq)]
pub enum StorageCall {
    Get(String),
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Delete(String),
}

/// Mock implementation of the StoragePipeline trait for testing
#[derive(Debug, Default)]
pub struct MockStoragePipeline {
    operations: Vec<MockOperation>,
}

#[derive(Debug)]
enum MockOperation {
    Get(String),
    Set(String, Vec<u8>, Option<Duration>),
}

impl StoragePipeline for MockStoragePipeline {
    fn get(&mut self, key: &str) -> &mut Self {
        self.operations.push(MockOperation::Get(key.to_string()));
        self
    }

    fn set(&mut self, key: &str, value: &[u8], ttl: Option<Duration>) -> &mut Self {
        self.operations
            .push(MockOperation::Set(key.to_string(), value.to_vec(), ttl));
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    // value and the virtual second it expires at
    data: HashMap<String, (Vec<u8>, Option<u64>)>,
    calls: Vec<StorageCall>,
}

/// Mock storage whose TTLs run on a [`MockClock`] and which logs every call
#[derive(Debug, Clone)]
pub struct MockStorage {
    state: Arc<Mutex<MockState>>,
    clock: Arc<MockClock>,
}

impl MockStorage {
    pub fn new(clock: Arc<MockClock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            clock,
        }
    }

    /// Place a value directly, bypassing the call log
    pub fn seed(&self, key: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .data
            .insert(key.to_string(), (value.as_bytes().to_vec(), None));
    }

    /// Live value at `key` as text, bypassing the call log
    pub fn value(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let state = self.state.lock().unwrap();
        state
            .data
            .get(key)
            .filter(|(_, expiry)| expiry.map_or(true, |at| now < at))
            .map(|(value, _)| String::from_utf8_lossy(value).into_owned())
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Only the writes from the call log
    pub fn writes(&self) -> Vec<StorageCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, StorageCall::Set { .. }))
            .collect()
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        state.calls.push(StorageCall::Get(key.to_string()));

        let expired = match state.data.get(key) {
            Some((_, Some(at))) => now >= *at,
            _ => false,
        };
        if expired {
            state.data.remove(key);
        }
        state.data.get(key).map(|(value, _)| value.clone())
    }

    fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        let expiry = ttl.map(|ttl| self.clock.now() + ttl.as_secs());
        let mut state = self.state.lock().unwrap();
        state.calls.push(StorageCall::Set {
            key: key.to_string(),
            value: String::from_utf8_lossy(value).into_owned(),
            ttl,
        });
        state
            .data
            .insert(key.to_string(), (value.to_vec(), expiry));
    }
}

#[async_trait]
impl StorageBackend for MockStorage {
    type Config = Arc<MockClock>;
    type Pipeline = MockStoragePipeline;

    async fn new(config: Self::Config) -> Result<Self> {
        Ok(Self::new(config))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.write(key, value, ttl);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.read(key).is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StorageCall::Delete(key.to_string()));
        Ok(state.data.remove(key).is_some())
    }

    fn pipeline(&self) -> Self::Pipeline {
        MockStoragePipeline::default()
    }

    async fn execute_pipeline(&self, pipeline: Self::Pipeline) -> Result<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::new();

        for op in pipeline.operations {
            match op {
                MockOperation::Get(key) => results.push(self.read(&key)),
                MockOperation::Set(key, value, ttl) => {
                    self.write(&key, &value, ttl);
                    results.push(None);
                }
            }
        }

        Ok(results)
    }
}

/// Rate limiter over a fresh mock storage and a clock starting at `start`
pub fn create_test_rate_limiter(
    settings: impl Into<ThrottleSettings>,
    start: u64,
) -> (RateLimiter<MockStorage>, MockStorage, Arc<MockClock>) {
    let clock = MockClock::new(start);
    let storage = MockStorage::new(Arc::clone(&clock));
    let factory = ThrottlerFactory::with_clock(storage.clone(), clock.clone());
    let limiter = RateLimiter::new(factory, HydratorFactory::new("test"), settings);
    (limiter, storage, clock)
}

/// Call `access` `attempts` times and report how many were admitted
pub async fn count_admitted<T: Throttle>(throttler: &T, attempts: usize) -> usize {
    let mut admitted = 0;
    for _ in 0..attempts {
        if throttler.access().await.unwrap() {
            admitted += 1;
        }
    }
    admitted
}
