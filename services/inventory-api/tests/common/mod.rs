//! Shared fixtures for the database-backed tests.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.
#![allow(dead_code)]

use async_trait::async_trait;
use inventory_api::api::AppState;
use inventory_api::cleanup::CleanupQueue;
use inventory_api::config::UploadConfig;
use inventory_api::object_store::{object_key_from_url, ObjectStore, StorageError};
use inventory_api::repository;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://test-bucket.s3.us-east-1.amazonaws.com";

/// In-memory object store; deletes can be made to fail a set number of times
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failing_deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn seed(&self, key: &str) -> String {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), vec![1, 2, 3]);
        format!("{}/{}", BASE_URL, key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Make the next `count` deletes fail
    pub fn fail_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(format!("{}/{}", BASE_URL, key))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let failing = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Delete("storage unavailable".to_string()));
        }

        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str) -> Result<String, StorageError> {
        Ok(format!("{}/{}?X-Amz-Expires=3600", BASE_URL, key))
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        object_key_from_url(url, None)
    }
}

pub async fn setup_with(max_attempts: i32) -> (PgPool, Arc<MemoryStore>, CleanupQueue) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&url).await.expect("connect");
    repository::run_migrations(&pool).await.expect("migrations");

    let store = Arc::new(MemoryStore::default());
    let cleanup = CleanupQueue::new(pool.clone(), store.clone(), max_attempts);
    (pool, store, cleanup)
}

pub async fn setup() -> (PgPool, Arc<MemoryStore>, CleanupQueue) {
    setup_with(3).await
}

pub fn app_state(pool: PgPool, store: Arc<MemoryStore>, cleanup: CleanupQueue) -> AppState {
    AppState {
        pool,
        store,
        cleanup,
        uploads: UploadConfig {
            max_file_size_bytes: 5 * 1024 * 1024,
        },
        service_name: "inventory-api".to_string(),
        metrics: None,
    }
}

pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}
