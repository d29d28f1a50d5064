// src/storage/tests/mod.rs

mod memory_tests;

// Common utilities for storage tests
pub(crate) mod common {
    use std::time::Duration;
    use tokio::time;

    use crate::error::Result;
    use crate::storage::{decode_f64, decode_u64, encode_number, StorageBackend};
    use crate::StoragePipeline as _;

    // Test basic storage operations that should work on any backend
    pub async fn test_basic_operations<S: StorageBackend>(storage: &S, prefix: &str) -> Result<()> {
        let key = format!("{}:basic", prefix);
        let value: &[u8] = b"test_value";

        // Absent keys read as None rather than failing
        assert_eq!(storage.get(&key).await?, None);
        assert!(!storage.exists(&key).await?);

        storage.set(&key, value, None).await?;
        assert_eq!(storage.get(&key).await?.as_deref(), Some(value));
        assert!(storage.exists(&key).await?);

        // Overwrite replaces the value
        storage.set(&key, b"other", None).await?;
        assert_eq!(storage.get(&key).await?.as_deref(), Some(&b"other"[..]));

        assert!(storage.delete(&key).await?);
        assert!(!storage.delete(&key).await?);
        assert!(!storage.exists(&key).await?);

        Ok(())
    }

    // Counter fields survive the backend as decimal text
    pub async fn test_counter_fields<S: StorageBackend>(storage: &S, prefix: &str) -> Result<()> {
        let hits = format!("{}:hits", prefix);
        let time = format!("{}:time", prefix);

        storage.set(&hits, &encode_number(20.5), None).await?;
        storage.set(&time, &encode_number(1_700_000_000u64), None).await?;

        let stored = storage.get(&hits).await?.unwrap_or_default();
        assert_eq!(decode_f64(&hits, &stored)?, 20.5);
        let stored = storage.get(&time).await?.unwrap_or_default();
        assert_eq!(decode_u64(&time, &stored)?, 1_700_000_000);

        storage.delete(&hits).await?;
        storage.delete(&time).await?;
        Ok(())
    }

    // Test expiration; `ttl` must be long enough for the backend's resolution
    pub async fn test_key_expiration<S: StorageBackend>(
        storage: &S,
        prefix: &str,
        ttl: Duration,
    ) -> Result<()> {
        let key = format!("{}:expiring", prefix);

        storage.set(&key, b"expiring_value", Some(ttl)).await?;
        assert!(storage.exists(&key).await?);

        time::sleep(ttl + ttl / 2).await;

        assert!(!storage.exists(&key).await?);
        assert_eq!(storage.get(&key).await?, None);

        Ok(())
    }

    // Test pipeline operations that should work on any backend
    pub async fn test_pipeline_operations<S: StorageBackend>(storage: &S, prefix: &str) -> Result<()> {
        let first = format!("{}:pipe1", prefix);
        let second = format!("{}:pipe2", prefix);
        let missing = format!("{}:missing", prefix);

        let mut pipeline = storage.pipeline();
        pipeline
            .set(&first, b"value1", Some(Duration::from_secs(60)))
            .set(&second, b"value2", Some(Duration::from_secs(60)));
        let results = storage.execute_pipeline(pipeline).await?;
        assert_eq!(results, vec![None, None]);

        // Gets come back in queue order, with None for absent keys
        let mut pipeline = storage.pipeline();
        pipeline.get(&second).get(&missing).get(&first);
        let results = storage.execute_pipeline(pipeline).await?;
        assert_eq!(
            results,
            vec![Some(b"value2".to_vec()), None, Some(b"value1".to_vec())]
        );

        storage.delete(&first).await?;
        storage.delete(&second).await?;

        Ok(())
    }
}
