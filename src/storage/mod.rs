// src/storage/mod.rs

pub mod memory;
pub mod redis;

#[cfg(test)]
mod tests;

pub use memory::{MemoryPipeline, MemoryStorage};
pub use redis::{RedisPipeline, RedisStorage};

use super::error::{Result, StorageError};
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

// Represents a batch of operations sent to the backend in one round trip.
// Batches are not transactions.
pub trait StoragePipeline: Send + Sync {
    // Add a get operation to the pipeline
    fn get(&mut self, key: &str) -> &mut Self;

    // Add a set operation to the pipeline
    fn set(&mut self, key: &str, value: &[u8], ttl: Option<Duration>) -> &mut Self;
}

/// Cache adapter contract that all storage backends must implement
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    // The type of configuration this storage backend accepts
    type Config: Send + Sync;

    // The type of pipeline this storage backend uses
    type Pipeline: StoragePipeline;

    // Creates a new instance of this storage backend with the given configuration
    async fn new(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    // Retrieves a value by key; an absent or expired key is `None`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    // Stores a value with a key
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    // Checks if a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    // Deletes a key
    async fn delete(&self, key: &str) -> Result<bool>;

    // Creates a new pipeline for executing multiple operations
    fn pipeline(&self) -> Self::Pipeline;

    // Executes a pipeline, returning one slot per queued operation.
    // Gets yield the stored value, sets yield `None`.
    async fn execute_pipeline(&self, pipeline: Self::Pipeline) -> Result<Vec<Option<Vec<u8>>>>;
}

/// Encode a counter field as decimal text so any Redis client can read it
pub fn encode_number<N: ToString>(value: N) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Decode a fractional counter field
pub fn decode_f64(key: &str, bytes: &[u8]) -> Result<f64> {
    parse_text(key, bytes)?
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| invalid_number(key, bytes))
}

/// Decode an integer field such as a counter or an epoch timestamp
pub fn decode_u64(key: &str, bytes: &[u8]) -> Result<u64> {
    parse_text(key, bytes)?
        .parse::<u64>()
        .map_err(|_| invalid_number(key, bytes))
}

fn parse_text<'a>(key: &str, bytes: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|_| invalid_number(key, bytes))
}

fn invalid_number(key: &str, bytes: &[u8]) -> crate::error::ThrottleError {
    StorageError::Serialization(format!(
        "value {:?} stored at {} is not a number",
        String::from_utf8_lossy(bytes),
        key
    ))
    .into()
}
