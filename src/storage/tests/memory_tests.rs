#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Barrier;
    use tokio::time;

    use crate::config::InMemoryConfig;
    use crate::error::{StorageError, ThrottleError};
    use crate::storage::{MemoryStorage, StorageBackend};
    use crate::StoragePipeline as _;

    use super::super::common;

    // Helper function to create a MemoryStorage instance for testing
    fn create_test_memory(max_entries: usize) -> MemoryStorage {
        MemoryStorage::new(InMemoryConfig {
            max_entries,
            use_background_task: false,
            cleanup_interval: Duration::from_secs(1),
        })
    }

    #[tokio::test]
    async fn test_memory_basic_operations() {
        let memory = create_test_memory(100);
        common::test_basic_operations(&memory, "memory").await.unwrap();
        common::test_counter_fields(&memory, "memory").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_key_expiration() {
        let memory = create_test_memory(100);
        common::test_key_expiration(&memory, "memory", Duration::from_millis(100))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_memory_pipeline_operations() {
        let memory = create_test_memory(100);
        common::test_pipeline_operations(&memory, "memory")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_memory_capacity_limit() {
        let memory = create_test_memory(3);

        for i in 0..3 {
            let key = format!("small_key_{}", i);
            memory.set(&key, b"value", None).await.unwrap();
        }

        // Overwriting an existing key does not need a new slot
        memory.set("small_key_0", b"again", None).await.unwrap();

        let overflow = memory.set("overflow_key", b"overflow", None).await;
        assert!(matches!(
            overflow,
            Err(ThrottleError::Storage(StorageError::CapacityExceeded(_)))
        ));

        // Deleting frees a slot
        memory.delete("small_key_1").await.unwrap();
        memory.set("overflow_key", b"overflow", None).await.unwrap();
        assert_eq!(memory.len().unwrap(), 3);
    }

    /// Entries past their TTL free their slot even before any sweep runs
    #[tokio::test]
    async fn test_memory_capacity_ignores_expired_entries() {
        let memory = create_test_memory(2);

        for key in ["a", "b"] {
            memory
                .set(key, b"v", Some(Duration::from_millis(50)))
                .await
                .unwrap();
        }
        time::sleep(Duration::from_millis(100)).await;

        memory
            .set("c", b"v", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(memory.len().unwrap(), 1);
        assert_eq!(memory.get("c").await.unwrap(), Some(b"v".to_vec()));

        // Live entries still count
        memory.set("d", b"v", None).await.unwrap();
        let overflow = memory.set("e", b"v", None).await;
        assert!(matches!(
            overflow,
            Err(ThrottleError::Storage(StorageError::CapacityExceeded(_)))
        ));
    }

    /// A pipeline stops at the first failing write
    #[tokio::test]
    async fn test_memory_pipeline_capacity_error() {
        let memory = create_test_memory(1);

        let mut pipeline = memory.pipeline();
        pipeline
            .set("a", b"1", None)
            .set("b", b"2", None);
        let result = memory.execute_pipeline(pipeline).await;

        assert!(matches!(
            result,
            Err(ThrottleError::Storage(StorageError::CapacityExceeded(_)))
        ));
        assert_eq!(memory.get("a").await.unwrap(), Some(b"1".to_vec()));
    }

    /// Expired entries are dropped lazily when read
    #[tokio::test]
    async fn test_memory_lazy_expiry() {
        let memory = create_test_memory(10);
        memory
            .set("short", b"v", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        memory.set("long", b"v", None).await.unwrap();
        assert_eq!(memory.len().unwrap(), 2);

        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(memory.get("short").await.unwrap(), None);
        assert_eq!(memory.len().unwrap(), 1);
        assert!(!memory.is_empty().unwrap());
    }

    /// The background sweep removes expired entries nobody reads
    #[tokio::test]
    async fn test_memory_background_cleanup() {
        let memory = MemoryStorage::new(InMemoryConfig {
            max_entries: 10,
            use_background_task: true,
            cleanup_interval: Duration::from_millis(50),
        });

        memory
            .set("swept", b"v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(memory.len().unwrap(), 1);

        time::sleep(Duration::from_millis(200)).await;
        assert!(memory.is_empty().unwrap());
    }

    /// Clones share the same entries
    #[tokio::test]
    async fn test_memory_clones_share_data() {
        let memory = create_test_memory(10);
        let clone = memory.clone();

        clone.set("shared", b"v", None).await.unwrap();
        assert!(memory.exists("shared").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_concurrent_writers() {
        let memory = create_test_memory(1000);
        let tasks = 10;
        let barrier = Arc::new(Barrier::new(tasks));

        let handles: Vec<_> = (0..tasks)
            .map(|i| {
                let memory = memory.clone();
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    for j in 0..20 {
                        let key = format!("task_{}_{}", i, j);
                        memory.set(&key, b"v", None).await.unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(memory.len().unwrap(), tasks * 20);
    }
}
