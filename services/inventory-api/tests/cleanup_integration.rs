//! Outbox retry behaviour against a real PostgreSQL.

mod common;

use common::{setup_with, unique, MemoryStore};
use inventory_api::cleanup::{CleanupQueue, CleanupReason};
use sqlx::PgPool;
use std::sync::{Mutex, MutexGuard};

// Sweeps pick up every aged job, so the tests in this file take turns.
static SWEEP_LOCK: Mutex<()> = Mutex::new(());

fn exclusive() -> MutexGuard<'static, ()> {
    SWEEP_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, sqlx::FromRow)]
struct JobState {
    attempts: i32,
    last_error: Option<String>,
    completed: bool,
}

async fn job_state(pool: &PgPool, id: i64) -> JobState {
    sqlx::query_as::<_, JobState>(
        "SELECT attempts, last_error, completed_at IS NOT NULL AS completed \
         FROM object_deletions WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn queue(pool: &PgPool, cleanup: &CleanupQueue, store: &MemoryStore) -> (i64, String) {
    let key = format!("brands/{}-stale.png", unique("brand"));
    let url = store.seed(&key);

    let mut tx = pool.begin().await.unwrap();
    let id = cleanup
        .enqueue(&mut tx, &url, CleanupReason::Replaced)
        .await
        .unwrap()
        .unwrap();
    tx.commit().await.unwrap();

    (id, key)
}

// The sweeper leaves fresh jobs to the post-commit path.
async fn age(pool: &PgPool, id: i64) {
    sqlx::query("UPDATE object_deletions SET created_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn failed_delete_is_recorded_and_retried_until_max_attempts() {
    let _turn = exclusive();
    let (pool, store, cleanup) = setup_with(3).await;
    let (id, key) = queue(&pool, &cleanup, &store).await;
    store.fail_deletes(usize::MAX);

    cleanup.drain(&[id]).await;
    let job = job_state(&pool, id).await;
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.unwrap().contains("storage unavailable"));
    assert!(!job.completed);

    // Too recent for the sweeper.
    cleanup.sweep(100).await.unwrap();
    assert_eq!(job_state(&pool, id).await.attempts, 1);

    age(&pool, id).await;
    cleanup.sweep(100).await.unwrap();
    assert_eq!(job_state(&pool, id).await.attempts, 2);
    cleanup.sweep(100).await.unwrap();
    assert_eq!(job_state(&pool, id).await.attempts, 3);

    // Abandoned: even a healthy store no longer sees the job.
    store.fail_deletes(0);
    cleanup.sweep(100).await.unwrap();
    let job = job_state(&pool, id).await;
    assert_eq!(job.attempts, 3);
    assert!(!job.completed);
    assert!(store.contains(&key));
}

#[tokio::test]
#[ignore]
async fn sweeper_completes_a_job_once_storage_recovers() {
    let _turn = exclusive();
    let (pool, store, cleanup) = setup_with(5).await;
    let (id, key) = queue(&pool, &cleanup, &store).await;
    store.fail_deletes(1);

    cleanup.drain(&[id]).await;
    assert_eq!(job_state(&pool, id).await.attempts, 1);
    assert!(store.contains(&key));

    age(&pool, id).await;
    cleanup.sweep(100).await.unwrap();

    let job = job_state(&pool, id).await;
    assert!(job.completed);
    assert_eq!(job.last_error, None);
    assert!(!store.contains(&key));
}
