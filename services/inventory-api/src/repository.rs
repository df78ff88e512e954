use crate::cleanup::{CleanupQueue, CleanupReason};
use crate::config::DatabaseConfig;
use anyhow::{Context, Result as AnyResult};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use std::marker::PhantomData;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Static description of a resource table
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub table: &'static str,
    /// Attribute columns returned to clients, excluding `id` and timestamps
    pub columns: &'static [&'static str],
    /// Column holding the object-storage URL, if the resource has one
    pub attachment: Option<&'static str>,
}

impl TableSchema {
    /// Column list used by every read and `RETURNING` clause
    pub fn select_list(&self) -> String {
        let mut list = String::from("id");
        for column in self.columns {
            list.push_str(", ");
            list.push_str(column);
        }
        list.push_str(", created_at, updated_at, deleted_at");
        list
    }
}

/// A persisted resource row
pub trait Entity: for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + 'static {
    const SCHEMA: TableSchema;

    fn id(&self) -> i64;

    /// Stored object URL, for resources with an attachment column
    fn attachment(&self) -> Option<&str> {
        None
    }
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Invalid {column}")]
    InvalidReference { column: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some("23505") {
                let target = db.constraint().unwrap_or("unique constraint").to_string();
                return RepositoryError::Conflict(format!("Duplicate value violates {}", target));
            }
        }
        RepositoryError::Database(err)
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Typed SQL parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    BigInt(Option<i64>),
    Double(Option<f64>),
    Date(Option<NaiveDate>),
    Bool(Option<bool>),
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(Some(v))
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(Some(v))
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        SqlValue::BigInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(Some(v))
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(Some(v))
    }
}

impl From<Option<NaiveDate>> for SqlValue {
    fn from(v: Option<NaiveDate>) -> Self {
        SqlValue::Date(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(Some(v))
    }
}

/// How a column behaves on update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnUpdate {
    Overwrite,
    /// `col = COALESCE($n, col)`
    KeepWhenNull,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: &'static str,
    pub value: SqlValue,
    pub on_update: OnUpdate,
}

/// Foreign key that must point at an active row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub column: &'static str,
    pub table: &'static str,
    pub id: i64,
}

/// Column values for an insert or update
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    assignments: Vec<Assignment>,
    references: Vec<Reference>,
    attachment: Option<String>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.assignments.push(Assignment {
            column,
            value: value.into(),
            on_update: OnUpdate::Overwrite,
        });
        self
    }

    pub fn keep_when_null(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.assignments.push(Assignment {
            column,
            value: value.into(),
            on_update: OnUpdate::KeepWhenNull,
        });
        self
    }

    /// Foreign key column; checked against `table` when set
    pub fn reference(mut self, column: &'static str, table: &'static str, id: Option<i64>) -> Self {
        if let Some(id) = id {
            self.references.push(Reference { column, table, id });
        }
        self.set(column, id)
    }

    /// Newly uploaded object URL for the resource's attachment column
    pub fn attachment(mut self, url: Option<String>) -> Self {
        self.attachment = url;
        self
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn new_attachment(&self) -> Option<&str> {
        self.attachment.as_deref()
    }

    /// Assignments including the attachment column. A missing upload keeps
    /// whatever object the row already references.
    fn resolved(&self, schema: &TableSchema) -> Vec<Assignment> {
        let mut assignments = self.assignments.clone();
        if let Some(column) = schema.attachment {
            assignments.push(Assignment {
                column,
                value: SqlValue::Text(self.attachment.clone()),
                on_update: OnUpdate::KeepWhenNull,
            });
        }
        assignments
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: SqlValue) {
    match value {
        SqlValue::Text(v) => builder.push_bind(v),
        SqlValue::BigInt(v) => builder.push_bind(v),
        SqlValue::Double(v) => builder.push_bind(v),
        SqlValue::Date(v) => builder.push_bind(v),
        SqlValue::Bool(v) => builder.push_bind(v),
    };
}

pub fn select_active_sql(schema: &TableSchema) -> String {
    format!(
        "SELECT {} FROM {} WHERE deleted_at IS NULL ORDER BY id ASC",
        schema.select_list(),
        schema.table
    )
}

pub fn select_active_by_id_sql(schema: &TableSchema) -> String {
    format!(
        "SELECT {} FROM {} WHERE id = $1 AND deleted_at IS NULL",
        schema.select_list(),
        schema.table
    )
}

/// Locks an active row and reads its attachment (NULL when the resource has none)
pub fn lock_active_sql(schema: &TableSchema) -> String {
    format!(
        "SELECT {} FROM {} WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        schema.attachment.unwrap_or("NULL::text"),
        schema.table
    )
}

/// Marks a row deleted. The attachment reference is cleared since its object
/// is queued for deletion in the same transaction.
pub fn soft_delete_sql(schema: &TableSchema) -> String {
    match schema.attachment {
        Some(column) => format!(
            "UPDATE {} SET deleted_at = NOW(), updated_at = NOW(), {} = NULL WHERE id = $1",
            schema.table, column
        ),
        None => format!(
            "UPDATE {} SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1",
            schema.table
        ),
    }
}

pub fn insert_query<'a>(schema: &TableSchema, assignments: Vec<Assignment>) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO {} (", schema.table));

    let mut separated = builder.separated(", ");
    for assignment in &assignments {
        separated.push(assignment.column);
    }
    builder.push(") VALUES (");

    for (i, assignment) in assignments.into_iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_value(&mut builder, assignment.value);
    }
    builder.push(") RETURNING ");
    builder.push(schema.select_list());
    builder
}

pub fn update_query<'a>(
    schema: &TableSchema,
    id: i64,
    assignments: Vec<Assignment>,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", schema.table));

    for assignment in assignments {
        builder.push(assignment.column);
        match assignment.on_update {
            OnUpdate::Overwrite => {
                builder.push(" = ");
                push_value(&mut builder, assignment.value);
            }
            OnUpdate::KeepWhenNull => {
                builder.push(" = COALESCE(");
                push_value(&mut builder, assignment.value);
                builder.push(", ");
                builder.push(assignment.column);
                builder.push(")");
            }
        }
        builder.push(", ");
    }

    builder.push("updated_at = NOW() WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND deleted_at IS NULL RETURNING ");
    builder.push(schema.select_list());
    builder
}

/// The stored object that an update makes obsolete, if any.
///
/// Only a prior object that differs from the row's new attachment is
/// returned, so a freshly uploaded object is never the one removed.
pub fn superseded_object<'a>(prior: Option<&'a str>, current: Option<&str>) -> Option<&'a str> {
    match (prior, current) {
        (Some(prior), Some(current)) if prior != current => Some(prior),
        (Some(prior), None) => Some(prior),
        _ => None,
    }
}

/// Create the PostgreSQL connection pool
pub async fn connect(config: &DatabaseConfig) -> AnyResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .idle_timeout(Some(config.idle_timeout()))
        .connect(&config.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!("Connected to PostgreSQL database");

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> AnyResult<()> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;

    info!("Database migrations completed");
    Ok(())
}

/// Generic soft-delete aware repository over one resource table
pub struct Repository<E> {
    pool: PgPool,
    cleanup: CleanupQueue,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            cleanup: self.cleanup.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(pool: PgPool, cleanup: CleanupQueue) -> Self {
        Self {
            pool,
            cleanup,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// All active rows
    pub async fn find_all(&self) -> RepositoryResult<Vec<E>> {
        let rows = sqlx::query_as::<_, E>(&select_active_sql(&E::SCHEMA))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// One active row
    pub async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<E>> {
        let row = sqlx::query_as::<_, E>(&select_active_by_id_sql(&E::SCHEMA))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Insert a row. A new upload is discarded if the insert fails.
    #[instrument(skip(self, changes), fields(table = E::SCHEMA.table))]
    pub async fn create(&self, changes: Changeset) -> RepositoryResult<E> {
        let result = self.try_create(&changes).await;

        if result.is_err() {
            if let Some(url) = changes.new_attachment() {
                self.cleanup.discard(url).await;
            }
        }

        result
    }

    async fn try_create(&self, changes: &Changeset) -> RepositoryResult<E> {
        let mut tx = self.pool.begin().await?;

        check_references(&mut tx, changes.references()).await?;

        let row = insert_query(&E::SCHEMA, changes.resolved(&E::SCHEMA))
            .build_query_as::<E>()
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(id = row.id(), "Row created");
        Ok(row)
    }

    /// Update an active row. Returns `None` when it does not exist.
    ///
    /// When a new upload replaces the stored object, the old object is queued
    /// for deletion in the same transaction and deleted after commit.
    #[instrument(skip(self, changes), fields(table = E::SCHEMA.table))]
    pub async fn update(&self, id: i64, changes: Changeset) -> RepositoryResult<Option<E>> {
        match self.try_update(id, &changes).await {
            Ok(Some((row, jobs))) => {
                self.cleanup.drain(&jobs).await;
                Ok(Some(row))
            }
            other => {
                if let Some(url) = changes.new_attachment() {
                    self.cleanup.discard(url).await;
                }
                other.map(|_| None)
            }
        }
    }

    async fn try_update(
        &self,
        id: i64,
        changes: &Changeset,
    ) -> RepositoryResult<Option<(E, Vec<i64>)>> {
        let mut tx = self.pool.begin().await?;

        let Some(prior) = lock_active(&mut tx, &E::SCHEMA, id).await? else {
            return Ok(None);
        };

        check_references(&mut tx, changes.references()).await?;

        let row = update_query(&E::SCHEMA, id, changes.resolved(&E::SCHEMA))
            .build_query_as::<E>()
            .fetch_one(&mut *tx)
            .await?;

        let mut jobs = Vec::new();
        if let Some(old) = superseded_object(prior.as_deref(), row.attachment()) {
            if let Some(job) = self
                .cleanup
                .enqueue(&mut tx, old, CleanupReason::Replaced)
                .await?
            {
                jobs.push(job);
            }
        }

        tx.commit().await?;

        debug!(id = id, replaced_objects = jobs.len(), "Row updated");
        Ok(Some((row, jobs)))
    }

    /// Soft-delete an active row and queue its stored object for deletion.
    /// Returns `false` when the row does not exist.
    #[instrument(skip(self), fields(table = E::SCHEMA.table))]
    pub async fn soft_delete(&self, id: i64) -> RepositoryResult<bool> {
        let mut tx = self.pool.begin().await?;

        let Some(prior) = lock_active(&mut tx, &E::SCHEMA, id).await? else {
            return Ok(false);
        };

        sqlx::query(&soft_delete_sql(&E::SCHEMA))
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let mut jobs = Vec::new();
        if let Some(url) = prior.as_deref() {
            if let Some(job) = self
                .cleanup
                .enqueue(&mut tx, url, CleanupReason::Deleted)
                .await?
            {
                jobs.push(job);
            }
        }

        tx.commit().await?;
        self.cleanup.drain(&jobs).await;

        debug!(id = id, "Row soft deleted");
        Ok(true)
    }
}

/// Lock an active row. `Some(attachment)` when it exists.
async fn lock_active(
    conn: &mut PgConnection,
    schema: &TableSchema,
    id: i64,
) -> RepositoryResult<Option<Option<String>>> {
    let prior = sqlx::query_scalar::<_, Option<String>>(&lock_active_sql(schema))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(prior)
}

async fn check_references(conn: &mut PgConnection, references: &[Reference]) -> RepositoryResult<()> {
    for reference in references {
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND deleted_at IS NULL)",
            reference.table
        ))
        .bind(reference.id)
        .fetch_one(&mut *conn)
        .await?;

        if !exists {
            return Err(RepositoryError::InvalidReference {
                column: reference.column,
            });
        }
    }
    Ok(())
}
