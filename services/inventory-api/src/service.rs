use crate::error::{AppError, AppResult};
use crate::object_store::ObjectStore;
use crate::repository::{Changeset, Entity, Repository};
use crate::response::ApiResponse;
use crate::upload::{store_upload, StoredUpload, Submission, UploadTarget};
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};
use validator::Validate;

/// A resource exposed under `/api/<mount>`.
///
/// Everything resource-specific lives here: naming, the attachment slot and
/// how validated input turns into column values. Persistence and HTTP
/// handling are shared.
pub trait Resource: Entity {
    /// Singular display name, e.g. `Brand`
    const NAME: &'static str;
    /// Plural display name used in list messages
    const PLURAL: &'static str;
    /// Key of the list payload, e.g. `brands`
    const COLLECTION: &'static str;
    /// Image slot, for resources that carry one
    const UPLOAD: Option<UploadTarget> = None;

    type Create: DeserializeOwned + Validate + Send;
    type Update: DeserializeOwned + Validate + Send;

    fn create_changes(input: Self::Create) -> AppResult<Changeset>;

    fn update_changes(input: Self::Update) -> AppResult<Changeset>;
}

/// Parse a path id; anything but a positive integer is rejected
pub fn parse_id<R: Resource>(raw: &str) -> AppResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation(format!(
            "Invalid {} ID",
            R::NAME.to_lowercase()
        ))),
    }
}

pub fn not_found<R: Resource>() -> AppError {
    AppError::NotFound(format!("{} not found", R::NAME))
}

/// Validation, upload coordination and response shaping for one resource
pub struct ResourceService<R> {
    repository: Repository<R>,
    store: Arc<dyn ObjectStore>,
}

impl<R> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            store: self.store.clone(),
        }
    }
}

impl<R: Resource> ResourceService<R> {
    pub fn new(repository: Repository<R>, store: Arc<dyn ObjectStore>) -> Self {
        Self { repository, store }
    }

    pub fn repository(&self) -> &Repository<R> {
        &self.repository
    }

    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn list(&self) -> AppResult<ApiResponse> {
        let records = self.repository.find_all().await?;
        let presented = try_join_all(records.iter().map(|record| self.present(record, None))).await?;

        let mut payload = serde_json::Map::new();
        payload.insert(R::COLLECTION.to_string(), Value::Array(presented));

        Ok(ApiResponse::ok(
            format!("{} retrieved successfully", R::PLURAL),
            Value::Object(payload),
        ))
    }

    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn get(&self, raw_id: &str) -> AppResult<ApiResponse> {
        let id = parse_id::<R>(raw_id)?;
        let record = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(not_found::<R>)?;

        Ok(ApiResponse::ok(
            format!("{} retrieved successfully", R::NAME),
            self.present(&record, None).await?,
        ))
    }

    #[instrument(skip(self, submission), fields(resource = R::NAME))]
    pub async fn create(&self, submission: Submission<R>) -> AppResult<ApiResponse> {
        let input: R::Create = submission.parse()?;
        input.validate()?;
        let changes = R::create_changes(input)?;

        let stored = self.store_file(submission).await?;
        let changes = changes.attachment(stored.as_ref().map(|s| s.location.clone()));

        let record = self.repository.create(changes).await?;

        Ok(ApiResponse::created(
            format!("{} created successfully", R::NAME),
            self.present(&record, stored.as_ref()).await?,
        ))
    }

    #[instrument(skip(self, submission), fields(resource = R::NAME))]
    pub async fn update(&self, raw_id: &str, submission: Submission<R>) -> AppResult<ApiResponse> {
        let id = parse_id::<R>(raw_id)?;
        let input: R::Update = submission.parse()?;
        input.validate()?;
        let changes = R::update_changes(input)?;

        let stored = self.store_file(submission).await?;
        let changes = changes.attachment(stored.as_ref().map(|s| s.location.clone()));

        let record = self
            .repository
            .update(id, changes)
            .await?
            .ok_or_else(not_found::<R>)?;

        Ok(ApiResponse::ok(
            format!("{} updated successfully", R::NAME),
            self.present(&record, stored.as_ref()).await?,
        ))
    }

    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn delete(&self, raw_id: &str) -> AppResult<ApiResponse> {
        let id = parse_id::<R>(raw_id)?;
        if !self.repository.soft_delete(id).await? {
            return Err(not_found::<R>());
        }

        let message = format!("{} soft deleted successfully", R::NAME);
        Ok(ApiResponse::ok(message.clone(), json!({ "message": message })))
    }

    /// Serialize a record and attach a fresh presigned link for its image.
    ///
    /// `fresh` is the upload made by this request; its link is reused when
    /// the record still points at it.
    pub async fn present(&self, record: &R, fresh: Option<&StoredUpload>) -> AppResult<Value> {
        let mut value =
            serde_json::to_value(record).map_err(|e| AppError::Internal(e.to_string()))?;

        let Some(target) = R::UPLOAD else {
            return Ok(value);
        };

        let link = match record.attachment() {
            None => None,
            Some(url) => match fresh {
                Some(stored) if stored.location == url => Some(stored.presigned_url.clone()),
                _ => self.presign(url).await?,
            },
        };

        if let Value::Object(ref mut fields) = value {
            fields.insert(
                target.presigned_field.to_string(),
                link.map(Value::String).unwrap_or(Value::Null),
            );
        }

        Ok(value)
    }

    async fn presign(&self, url: &str) -> AppResult<Option<String>> {
        match self.store.key_from_url(url) {
            Some(key) => Ok(Some(self.store.presign_get(&key).await?)),
            None => {
                warn!(url = %url, "Stored attachment is not a valid object URL");
                Ok(None)
            }
        }
    }

    async fn store_file(&self, submission: Submission<R>) -> AppResult<Option<StoredUpload>> {
        let Some(target) = R::UPLOAD else {
            return Ok(None);
        };
        let name = submission.text(target.name_field);
        let Some(file) = submission.file else {
            return Ok(None);
        };

        let stored = store_upload(self.store.as_ref(), &target, file, name.as_deref()).await?;
        Ok(Some(stored))
    }
}
