// src/storage/redis.rs

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Pipeline};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RedisConfig;
use crate::error::{Result, StorageError, ThrottleError};
use crate::storage::{StorageBackend, StoragePipeline};
use crate::storage_op;

/// Redis pipeline implementation
pub struct RedisPipeline {
    pipeline: Pipeline,
}

impl RedisPipeline {
    /// Creates a new Redis pipeline
    fn new() -> Self {
        Self {
            pipeline: Pipeline::new(),
        }
    }
}

impl StoragePipeline for RedisPipeline {
    fn get(&mut self, key: &str) -> &mut Self {
        self.pipeline.cmd("GET").arg(key);
        self
    }

    fn set(&mut self, key: &str, value: &[u8], ttl: Option<Duration>) -> &mut Self {
        match ttl {
            Some(ttl) => {
                self.pipeline
                    .cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EX")
                    .arg(ttl_secs(ttl));
            }
            None => {
                self.pipeline.cmd("SET").arg(key).arg(value);
            }
        }
        self
    }
}

// Redis expiries have one-second resolution and must be positive
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

pub struct RedisStorage {
    client: Client,
    connection: Arc<tokio::sync::Mutex<ConnectionManager>>,
    config: RedisConfig,
}

impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage")
            .field("url", &self.config.url)
            .field("connection_timeout", &self.config.connection_timeout)
            .finish()
    }
}

impl Clone for RedisStorage {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            connection: Arc::clone(&self.connection),
            config: self.config.clone(),
        }
    }
}

impl RedisStorage {
    /// Creates a new Redis storage with the given configuration
    pub async fn new(config: RedisConfig) -> Result<Self> {
        // Open the client - this doesn't actually connect to Redis yet
        let client = Client::open(config.url.as_str())
            .map_err(|e| StorageError::RedisConnection(e.to_string()))?;

        let connection_future = ConnectionManager::new(client.clone());

        let connection_manager =
            match tokio::time::timeout(config.connection_timeout, connection_future).await {
                Ok(result) => result.map_err(|e| StorageError::RedisConnection(e.to_string()))?,
                Err(_) => {
                    return Err(StorageError::RedisConnection(format!(
                        "Connection to Redis at {} timed out after {:?}",
                        config.url, config.connection_timeout
                    ))
                    .into());
                }
            };

        tracing::debug!(url = %config.url, "Connected to Redis");

        Ok(Self {
            client,
            connection: Arc::new(tokio::sync::Mutex::new(connection_manager)),
            config,
        })
    }

    /// Ping Redis to check health with timeout
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.lock().await;

        let ping_future = redis::AsyncCommands::ping::<String>(&mut *conn);

        let result = match tokio::time::timeout(self.config.connection_timeout, ping_future).await {
            Ok(inner_result) => inner_result?,
            Err(_) => {
                return Err(StorageError::RedisCommand(format!(
                    "Redis PING operation timed out after {:?}",
                    self.config.connection_timeout
                ))
                .into());
            }
        };

        if result == "PONG" {
            Ok(())
        } else {
            Err(StorageError::RedisCommand(format!(
                "Unexpected response from Redis PING: {}",
                result
            ))
            .into())
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[async_trait]
impl StorageBackend for RedisStorage {
    type Config = RedisConfig;
    type Pipeline = RedisPipeline;

    async fn new(config: Self::Config) -> Result<Self> {
        Self::new(config).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let start = Instant::now();
        let mut conn = self.connection.lock().await;
        let result: Result<Option<Vec<u8>>> = conn
            .get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(ThrottleError::from);
        storage_op!("get", key, result, elapsed_ms(start));
        result
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let start = Instant::now();
        let mut conn = self.connection.lock().await;

        let result: Result<()> = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        }
        .map_err(ThrottleError::from);

        storage_op!("set", key, result, elapsed_ms(start));
        result
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.lock().await;
        let result: bool = conn.exists::<_, bool>(key).await?;
        Ok(result)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let start = Instant::now();
        let mut conn = self.connection.lock().await;
        let result: Result<i64> = conn
            .del::<_, i64>(key)
            .await
            .map_err(ThrottleError::from);
        storage_op!("del", key, result, elapsed_ms(start));
        Ok(result? > 0)
    }

    fn pipeline(&self) -> Self::Pipeline {
        RedisPipeline::new()
    }

    async fn execute_pipeline(&self, pipeline: Self::Pipeline) -> Result<Vec<Option<Vec<u8>>>> {
        let start = Instant::now();
        let mut conn = self.connection.lock().await;
        let results: Result<Vec<redis::Value>> = pipeline
            .pipeline
            .query_async(&mut *conn)
            .await
            .map_err(ThrottleError::from);
        storage_op!("pipeline", "", results, elapsed_ms(start));

        results?.into_iter().map(value_bytes).collect()
    }
}

// Convert a Redis reply into the pipeline's byte-slot representation
fn value_bytes(value: redis::Value) -> Result<Option<Vec<u8>>> {
    match value {
        redis::Value::Nil | redis::Value::Okay => Ok(None),
        redis::Value::BulkString(bytes) => Ok(Some(bytes)),
        redis::Value::SimpleString(s) => Ok(Some(s.into_bytes())),
        redis::Value::Int(i) => Ok(Some(i.to_string().into_bytes())),
        redis::Value::Double(d) => Ok(Some(d.to_string().into_bytes())),
        other => Err(StorageError::Serialization(format!(
            "Unsupported Redis value in pipeline reply: {:?}",
            other
        ))
        .into()),
    }
}
