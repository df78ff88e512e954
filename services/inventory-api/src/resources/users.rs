use crate::api::{ApiJson, AppState};
use crate::error::{AppError, AppResult};
use crate::form;
use crate::password::{hash_password, verify_password};
use crate::repository::{Changeset, Entity, Repository, RepositoryResult, TableSchema};
use crate::response::ApiResponse;
use crate::service::{not_found, parse_id, Resource, ResourceService};
use crate::upload::UploadTarget;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::{get, patch, post, put},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use tracing::{info, instrument};
use validator::Validate;

/// Staff account. The password hash is stored but never selected here.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub profile_image: Option<String>,
    pub role_id: i64,
    pub employed_at: Option<NaiveDate>,
    pub banking_id: Option<i64>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 3, max = 50, message = "must be between 3 and 50 characters"))]
    pub username: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 7, max = 20, message = "must be between 7 and 20 characters"))]
    pub phone: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub role_id: i64,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub employed_at: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub banking_id: Option<i64>,
}

/// Same as create, except the password is only replaced when given
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 3, max = 50, message = "must be between 3 and 50 characters"))]
    pub username: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 7, max = 20, message = "must be between 7 and 20 characters"))]
    pub phone: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: Option<String>,
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub role_id: i64,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub employed_at: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub banking_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearch {
    #[serde(default)]
    pub username: String,
    #[serde(default, deserialize_with = "form::boolean")]
    pub exact: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordInput {
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusInput {
    #[serde(deserialize_with = "form::boolean")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, message = "is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

impl Entity for User {
    const SCHEMA: TableSchema = TableSchema {
        table: "users",
        columns: &[
            "username",
            "email",
            "phone",
            "address",
            "profile_image",
            "role_id",
            "employed_at",
            "banking_id",
            "last_login",
        ],
        attachment: Some("profile_image"),
    };

    fn id(&self) -> i64 {
        self.id
    }

    fn attachment(&self) -> Option<&str> {
        self.profile_image.as_deref()
    }
}

impl Resource for User {
    const NAME: &'static str = "User";
    const PLURAL: &'static str = "Users";
    const COLLECTION: &'static str = "users";
    const UPLOAD: Option<UploadTarget> = Some(UploadTarget {
        field: "profile_image",
        label: "profile image",
        collection: "users",
        prefix: "user",
        name_field: "username",
        presigned_field: "profileImagePresignedUrl",
    });

    type Create = CreateUserInput;
    type Update = UpdateUserInput;

    fn create_changes(input: CreateUserInput) -> AppResult<Changeset> {
        Ok(Changeset::new()
            .set("username", input.username)
            .set("email", input.email)
            .set("phone", input.phone)
            .set("address", input.address)
            .set("password", hash_password(&input.password)?)
            .reference("role_id", "roles", Some(input.role_id))
            .set("employed_at", input.employed_at)
            .reference("banking_id", "banking_details", input.banking_id))
    }

    fn update_changes(input: UpdateUserInput) -> AppResult<Changeset> {
        let password = input.password.as_deref().map(hash_password).transpose()?;

        Ok(Changeset::new()
            .set("username", input.username)
            .set("email", input.email)
            .set("phone", input.phone)
            .set("address", input.address)
            .keep_when_null("password", password)
            .reference("role_id", "roles", Some(input.role_id))
            .set("employed_at", input.employed_at)
            .reference("banking_id", "banking_details", input.banking_id))
    }
}

/// `ILIKE` pattern matching `query` anywhere, with wildcards escaped
pub fn contains_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl Repository<User> {
    /// Active users by exact username or case-insensitive substring
    pub async fn search_by_username(&self, query: &str, exact: bool) -> RepositoryResult<Vec<User>> {
        let select = User::SCHEMA.select_list();
        let (sql, param) = if exact {
            (
                format!(
                    "SELECT {} FROM users WHERE username = $1 AND deleted_at IS NULL ORDER BY id ASC",
                    select
                ),
                query.to_string(),
            )
        } else {
            (
                format!(
                    r"SELECT {} FROM users WHERE username ILIKE $1 ESCAPE '\' AND deleted_at IS NULL ORDER BY id ASC",
                    select
                ),
                contains_pattern(query),
            )
        };

        let users = sqlx::query_as::<_, User>(&sql)
            .bind(param)
            .fetch_all(self.pool())
            .await?;
        Ok(users)
    }

    /// Store a new password hash. `false` when the user does not exist.
    pub async fn set_password(&self, id: i64, hash: String) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(hash)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Activate or deactivate a user, including already deactivated ones
    pub async fn set_active(&self, id: i64, active: bool) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET deleted_at = CASE WHEN $2 THEN NULL ELSE COALESCE(deleted_at, NOW()) END, \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            User::SCHEMA.select_list()
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(self.pool())
        .await?;

        Ok(user)
    }

    /// Id and password hash of an active user
    pub async fn credentials(&self, username: &str) -> RepositoryResult<Option<(i64, String)>> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, password FROM users WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn touch_last_login(&self, id: i64) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET last_login = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            User::SCHEMA.select_list()
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(user)
    }
}

/// Routes beyond plain CRUD, merged into `/api/users`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(search))
        .route("/login", post(login))
        .route("/:id/password", put(change_password))
        .route("/:id/status", patch(change_status))
}

#[instrument(skip(service))]
async fn search(
    State(service): State<ResourceService<User>>,
    query: Result<Query<UserSearch>, QueryRejection>,
) -> AppResult<ApiResponse> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    let username = query.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation(
            "username: query parameter is required".to_string(),
        ));
    }

    let users = service
        .repository()
        .search_by_username(username, query.exact)
        .await?;
    let presented = try_join_all(users.iter().map(|user| service.present(user, None))).await?;

    Ok(ApiResponse::ok(
        "Users retrieved successfully",
        json!({ "users": Value::Array(presented) }),
    ))
}

#[instrument(skip(service, input))]
async fn change_password(
    State(service): State<ResourceService<User>>,
    Path(raw_id): Path<String>,
    ApiJson(input): ApiJson<PasswordInput>,
) -> AppResult<ApiResponse> {
    let id = parse_id::<User>(&raw_id)?;
    input.validate()?;

    let hash = hash_password(&input.password)?;
    if !service.repository().set_password(id, hash).await? {
        return Err(not_found::<User>());
    }

    info!(user_id = id, "Password changed");
    let message = "Password updated successfully";
    Ok(ApiResponse::ok(message, json!({ "message": message })))
}

#[instrument(skip(service, input))]
async fn change_status(
    State(service): State<ResourceService<User>>,
    Path(raw_id): Path<String>,
    ApiJson(input): ApiJson<StatusInput>,
) -> AppResult<ApiResponse> {
    let id = parse_id::<User>(&raw_id)?;
    let user = service
        .repository()
        .set_active(id, input.is_active)
        .await?
        .ok_or_else(not_found::<User>)?;

    let message = if input.is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    Ok(ApiResponse::ok(message, service.present(&user, None).await?))
}

#[instrument(skip(service, input))]
async fn login(
    State(service): State<ResourceService<User>>,
    ApiJson(input): ApiJson<LoginInput>,
) -> AppResult<ApiResponse> {
    input.validate()?;
    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

    let (id, hash) = service
        .repository()
        .credentials(&input.username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&input.password, &hash)? {
        return Err(invalid());
    }

    let user = service
        .repository()
        .touch_last_login(id)
        .await?
        .ok_or_else(invalid)?;

    info!(user_id = id, "User logged in");
    Ok(ApiResponse::ok(
        "Login successful",
        service.present(&user, None).await?,
    ))
}
