//! Deferred deletion of storage objects.
//!
//! Object deletions are recorded in the `object_deletions` table inside the
//! same transaction as the row mutation that made the object obsolete. After
//! commit the queued keys are deleted right away; whatever fails is retried by
//! the background sweeper until `max_attempts` is reached. Row state is the
//! source of truth, storage converges to it.

use crate::object_store::ObjectStore;
use sqlx::{FromRow, PgConnection, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Why an object was queued for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// A newer upload replaced it on update
    Replaced,
    /// Its owning record was soft-deleted
    Deleted,
    /// It was uploaded for a mutation that did not go through
    Discarded,
}

impl CleanupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupReason::Replaced => "replaced",
            CleanupReason::Deleted => "deleted",
            CleanupReason::Discarded => "discarded",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DeletionJob {
    id: i64,
    object_key: String,
    attempts: i32,
}

/// Outbox of pending storage deletions
#[derive(Clone)]
pub struct CleanupQueue {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
    max_attempts: i32,
}

impl CleanupQueue {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>, max_attempts: i32) -> Self {
        Self {
            pool,
            store,
            max_attempts,
        }
    }

    /// Queue the object behind `url` for deletion on an open transaction.
    ///
    /// Returns the job id, or `None` when no object key can be derived from
    /// the URL.
    pub async fn enqueue(
        &self,
        conn: &mut PgConnection,
        url: &str,
        reason: CleanupReason,
    ) -> Result<Option<i64>, sqlx::Error> {
        let Some(key) = self.store.key_from_url(url) else {
            warn!(url = %url, "Stored URL has no object key, nothing to clean up");
            return Ok(None);
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO object_deletions (object_key, reason)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&key)
        .bind(reason.as_str())
        .fetch_one(conn)
        .await?;

        debug!(job_id = id, object_key = %key, reason = reason.as_str(), "Object deletion queued");

        Ok(Some(id))
    }

    /// Queue and immediately attempt the deletion of an object outside any
    /// transaction. Used to discard uploads whose mutation failed.
    pub async fn discard(&self, url: &str) {
        let queued = match self.pool.acquire().await {
            Ok(mut conn) => self.enqueue(&mut conn, url, CleanupReason::Discarded).await,
            Err(e) => Err(e),
        };

        match queued {
            Ok(Some(id)) => self.drain(&[id]).await,
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, url = %url, "Failed to queue discarded upload, deleting directly");
                if let Some(key) = self.store.key_from_url(url) {
                    if let Err(e) = self.store.delete_object(&key).await {
                        error!(error = %e, object_key = %key, "Discarded upload left in storage");
                    }
                }
            }
        }
    }

    /// Attempt the given jobs now. Failures stay queued for the sweeper.
    pub async fn drain(&self, job_ids: &[i64]) {
        if job_ids.is_empty() {
            return;
        }

        let jobs = sqlx::query_as::<_, DeletionJob>(
            r#"
            SELECT id, object_key, attempts
            FROM object_deletions
            WHERE id = ANY($1) AND completed_at IS NULL
            "#,
        )
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await;

        match jobs {
            Ok(jobs) => {
                for job in jobs {
                    self.process(job).await;
                }
            }
            Err(e) => warn!(error = %e, "Failed to load deletion jobs, leaving them to the sweeper"),
        }
    }

    /// Process one batch of pending jobs. Returns the number of jobs attempted.
    #[instrument(skip(self))]
    pub async fn sweep(&self, batch_size: i64) -> Result<usize, sqlx::Error> {
        // Give the post-commit fast path a head start before picking jobs up.
        let jobs = sqlx::query_as::<_, DeletionJob>(
            r#"
            SELECT id, object_key, attempts
            FROM object_deletions
            WHERE completed_at IS NULL
              AND attempts < $1
              AND created_at < NOW() - INTERVAL '5 seconds'
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(self.max_attempts)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        let count = jobs.len();
        for job in jobs {
            self.process(job).await;
        }

        Ok(count)
    }

    /// Run the sweeper until `shutdown` is cancelled
    pub async fn run(self, interval: Duration, batch_size: i64, shutdown: CancellationToken) {
        info!(
            poll_interval_secs = interval.as_secs(),
            batch_size = batch_size,
            "Starting object cleanup sweeper"
        );

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Object cleanup sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.sweep(batch_size).await {
                        Ok(0) => {}
                        Ok(n) => debug!(jobs = n, "Cleanup sweep finished"),
                        Err(e) => error!(error = %e, "Cleanup sweep failed"),
                    }
                }
            }
        }
    }

    // S3 deletes are idempotent, so a job picked up twice is harmless.
    async fn process(&self, job: DeletionJob) {
        match self.store.delete_object(&job.object_key).await {
            Ok(()) => {
                let result = sqlx::query(
                    "UPDATE object_deletions SET completed_at = NOW(), last_error = NULL WHERE id = $1",
                )
                .bind(job.id)
                .execute(&self.pool)
                .await;

                if let Err(e) = result {
                    warn!(error = %e, job_id = job.id, "Object deleted but job not marked complete");
                }
                metrics::counter!("cleanup_jobs_completed_total").increment(1);
            }
            Err(e) => {
                let attempts = job.attempts + 1;
                warn!(
                    job_id = job.id,
                    object_key = %job.object_key,
                    attempts = attempts,
                    error = ?e,
                    "Object deletion failed"
                );
                if attempts >= self.max_attempts {
                    error!(job_id = job.id, object_key = %job.object_key, "Giving up on object deletion");
                }

                let result = sqlx::query(
                    "UPDATE object_deletions SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
                )
                .bind(job.id)
                .bind(format!("{:?}", e))
                .execute(&self.pool)
                .await;

                if let Err(e) = result {
                    warn!(error = %e, job_id = job.id, "Failed to record deletion failure");
                }
                metrics::counter!("cleanup_jobs_failed_total").increment(1);
            }
        }
    }
}
