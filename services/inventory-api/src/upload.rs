use crate::config::UploadConfig;
use crate::error::{AppError, AppResult};
use crate::object_store::{ObjectStore, StorageError};
use crate::service::Resource;
use axum::async_trait;
use axum::extract::{FromRef, FromRequest, Multipart, Request};
use axum::http::{header, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, instrument};

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// Where a resource's image goes and how it is named
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTarget {
    /// Multipart field carrying the file
    pub field: &'static str,
    /// Human name used in error messages
    pub label: &'static str,
    /// Top-level key prefix in the bucket
    pub collection: &'static str,
    /// File name prefix within the collection
    pub prefix: &'static str,
    /// Request attribute the key is named after
    pub name_field: &'static str,
    /// Response field carrying the presigned link
    pub presigned_field: &'static str,
}

/// A validated file waiting to be stored
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A file written to object storage
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub key: String,
    pub location: String,
    pub presigned_url: String,
}

/// Lower-case, every run of non-alphanumerics collapsed to a single `-`,
/// no leading or trailing `-`
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// `{collection}/{prefix}-{sanitized-name}-{millis}-{original filename}`
pub fn object_key(target: &UploadTarget, name: Option<&str>, millis: i64, file_name: &str) -> String {
    let sanitized = name.map(sanitize_file_name).unwrap_or_default();
    let sanitized = if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    };

    format!(
        "{}/{}-{}-{}-{}",
        target.collection,
        target.prefix,
        sanitized,
        millis,
        base_name(file_name)
    )
}

// Some clients send the full client-side path.
fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

/// Both the extension and the declared MIME type must be an allowed image type
pub fn is_allowed_image(file_name: &str, content_type: &str) -> bool {
    let extension_ok = Path::new(base_name(file_name))
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    extension_ok && ALLOWED_CONTENT_TYPES.contains(&mime.as_str())
}

/// Write a pending file under the target's naming scheme and mint a link for it
#[instrument(skip(store, pending), fields(collection = target.collection, file_name = %pending.file_name))]
pub async fn store_upload(
    store: &dyn ObjectStore,
    target: &UploadTarget,
    pending: PendingUpload,
    name: Option<&str>,
) -> Result<StoredUpload, StorageError> {
    let key = object_key(target, name, Utc::now().timestamp_millis(), &pending.file_name);
    let location = store
        .put_object(&key, pending.bytes, &pending.content_type)
        .await?;
    let presigned_url = store.presign_get(&key).await?;

    debug!(key = %key, "Upload stored");

    Ok(StoredUpload {
        key,
        location,
        presigned_url,
    })
}

/// Request body of a write endpoint: attributes plus at most one image.
///
/// Accepts `application/json` or `multipart/form-data`. File parts are
/// validated here (field, count, type, size) but only stored once the
/// attributes have been validated.
#[derive(Debug)]
pub struct Submission<R> {
    pub fields: Map<String, Value>,
    pub file: Option<PendingUpload>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Submission<R> {
    pub fn new(fields: Map<String, Value>, file: Option<PendingUpload>) -> Self {
        Self {
            fields,
            file,
            _resource: PhantomData,
        }
    }

    /// Deserialize the attributes into a request DTO
    pub fn parse<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| AppError::Validation(e.to_string()))
    }

    /// Attribute as text, whatever its JSON type
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[async_trait]
impl<S, R> FromRequest<S> for Submission<R>
where
    S: Send + Sync,
    UploadConfig: FromRef<S>,
    R: Resource,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let limits = UploadConfig::from_ref(state);
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Upload(e.body_text()))?;
            read_multipart(multipart, R::UPLOAD, limits.max_file_size_bytes).await
        } else if content_type.starts_with("application/json") {
            let Json(fields) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            Ok(Self::new(fields, None))
        } else {
            Err(AppError::Validation(
                "Expected a JSON or multipart/form-data body".to_string(),
            ))
        }
    }
}

async fn read_multipart<R>(
    mut multipart: Multipart,
    target: Option<UploadTarget>,
    max_file_size: usize,
) -> AppResult<Submission<R>> {
    let mut fields = Map::new();
    let mut file: Option<PendingUpload> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(multipart_error)?;
            fields.insert(name, Value::String(value));
            continue;
        };

        // Browsers send an empty part for an untouched file input.
        if file_name.is_empty() {
            continue;
        }

        let target = match target {
            Some(t) if t.field == name => t,
            _ => {
                return Err(AppError::Upload(format!(
                    "Unexpected file field '{}'",
                    name
                )))
            }
        };

        if file.is_some() {
            return Err(AppError::Upload(format!(
                "Only one {} file is allowed",
                target.label
            )));
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_allowed_image(&file_name, &content_type) {
            return Err(AppError::Upload(
                "Only PNG, JPEG, and JPG files are allowed".to_string(),
            ));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > max_file_size {
                return Err(AppError::Upload("File too large".to_string()));
            }
            bytes.extend_from_slice(&chunk);
        }

        file = Some(PendingUpload {
            file_name,
            content_type,
            bytes,
        });
    }

    Ok(Submission::new(fields, file))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Upload("File too large".to_string())
    } else {
        AppError::Upload(err.body_text())
    }
}
