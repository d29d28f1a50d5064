// for error definitions
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThrottleError {
    /// Identifying data had a shape that cannot be turned into a cache key
    #[error("Invalid identifier type: {0}")]
    InvalidIdentifierType(String),

    /// Settings that would make a throttler misbehave (zero limits, short TTLs)
    #[error("Invalid throttle settings: {0}")]
    InvalidSettings(String),

    /// Errors related to the storage backend
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Redis connection errors
    #[error("Redis connection error: {0}")]
    RedisConnection(String),

    // Redis authentication errors
    #[error("Redis authentication error: {0}")]
    RedisAuth(String),

    /// Redis command errors
    #[error("Redis command error: {0}")]
    RedisCommand(String),

    /// A stored value could not be decoded as a counter field
    #[error("Data serialization error: {0}")]
    Serialization(String),

    /// The in-memory backend is full
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A writer panicked while holding the in-memory lock
    #[error("Storage lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<redis::RedisError> for ThrottleError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::AuthenticationFailed => {
                ThrottleError::Storage(StorageError::RedisAuth(err.to_string()))
            }
            redis::ErrorKind::IoError | redis::ErrorKind::ClientError => {
                ThrottleError::Storage(StorageError::RedisConnection(err.to_string()))
            }
            _ => ThrottleError::Storage(StorageError::RedisCommand(err.to_string())),
        }
    }
}

// configuration documents are JSON; anything malformed is a configuration error
impl From<serde_json::Error> for ThrottleError {
    fn from(err: serde_json::Error) -> Self {
        ThrottleError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ThrottleError {
    fn from(err: std::io::Error) -> Self {
        ThrottleError::Config(err.to_string())
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, ThrottleError>;
