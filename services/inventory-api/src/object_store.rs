use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to upload file to S3")]
    Upload(String),

    #[error("Failed to delete file from S3")]
    Delete(String),

    #[error("Failed to generate pre-signed URL")]
    Presign(String),
}

/// Object storage collaborator shared by every resource
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object and return its location URL
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Time-limited GET link for an object
    async fn presign_get(&self, key: &str) -> Result<String, StorageError>;

    /// Recover the object key from a location URL produced by `put_object`
    fn key_from_url(&self, url: &str) -> Option<String>;
}

/// S3-backed object store
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    force_path_style: bool,
    presigned_url_expiry: Duration,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    pub async fn new(config: &S3Config) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "inventory-api-config",
            ));
        }

        let aws_config = loader.load().await;
        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 object store initialized"
        );

        Ok(Self::with_client(client, config))
    }

    /// Wrap an already configured client
    pub fn with_client(client: S3Client, config: &S3Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
            force_path_style: config.force_path_style,
            presigned_url_expiry: config.presigned_url_expiry(),
        }
    }

    /// Location URL of an object, percent-encoded per path segment.
    ///
    /// Follows the client's addressing: `endpoint/bucket/key` for path-style,
    /// `bucket.endpoint/key` otherwise.
    pub fn object_url(&self, key: &str) -> String {
        let encoded = encode_key(key);
        let endpoint = self
            .endpoint_url
            .as_deref()
            .map(|e| e.trim_end_matches('/').to_string());

        if self.force_path_style {
            let endpoint = endpoint
                .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region));
            return format!("{}/{}/{}", endpoint, self.bucket, encoded);
        }

        match endpoint.as_deref().and_then(|e| Url::parse(e).ok()) {
            Some(endpoint) => {
                let host = endpoint.host_str().unwrap_or_default();
                let port = endpoint.port().map(|p| format!(":{}", p)).unwrap_or_default();
                format!(
                    "{}://{}.{}{}/{}",
                    endpoint.scheme(),
                    self.bucket,
                    host,
                    port,
                    encoded
                )
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, encoded
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, body), fields(size_bytes = body.len()))]
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload(format!("{:?}", e)))?;

        metrics::counter!("storage_objects_uploaded_total").increment(1);
        debug!(key = %key, "Object uploaded to S3");

        Ok(self.object_url(key))
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete(format!("{:?}", e)))?;

        metrics::counter!("storage_objects_deleted_total").increment(1);
        debug!(key = %key, "Object deleted from S3");
        Ok(())
    }

    async fn presign_get(&self, key: &str) -> Result<String, StorageError> {
        let presigning_config = PresigningConfig::expires_in(self.presigned_url_expiry)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::Presign(format!("{:?}", e)))?;

        metrics::counter!("storage_presign_total").increment(1);

        Ok(presigned.uri().to_string())
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let bucket_prefix = self.force_path_style.then_some(self.bucket.as_str());
        object_key_from_url(url, bucket_prefix)
    }
}

/// Percent-encode each segment of an object key, keeping the `/` separators
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decode the object key from a location URL.
///
/// Virtual-hosted URLs carry the key as the whole path. Path-style URLs
/// (custom endpoints) start with the bucket segment, which is stripped when
/// `path_style_bucket` is given.
pub fn object_key_from_url(url: &str, path_style_bucket: Option<&str>) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path().strip_prefix('/').unwrap_or(parsed.path());

    let path = match path_style_bucket {
        Some(bucket) => path
            .strip_prefix(bucket)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path),
        None => path,
    };

    let key = urlencoding::decode(path).ok()?.into_owned();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint_url: Option<&str>, force_path_style: bool) -> S3Config {
        S3Config {
            bucket: "inventory-assets".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string()),
            endpoint_url: endpoint_url.map(String::from),
            force_path_style,
            presigned_url_expiry_secs: 3600,
        }
    }

    fn offline_store(config: &S3Config) -> S3ObjectStore {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
                None,
                None,
                "test",
            ));
        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(config.force_path_style);
        S3ObjectStore::with_client(S3Client::from_conf(builder.build()), config)
    }

    #[test]
    fn test_key_from_virtual_hosted_url() {
        let key = object_key_from_url(
            "https://inventory-assets.s3.us-east-1.amazonaws.com/brands/brand-acme-1700000000000-logo%20final.png",
            None,
        );
        assert_eq!(
            key.as_deref(),
            Some("brands/brand-acme-1700000000000-logo final.png")
        );
    }

    #[test]
    fn test_key_from_path_style_url() {
        let key = object_key_from_url(
            "http://localhost:9000/inventory-assets/users/user-jane-1-me.jpg",
            Some("inventory-assets"),
        );
        assert_eq!(key.as_deref(), Some("users/user-jane-1-me.jpg"));
    }

    #[test]
    fn test_key_from_invalid_url() {
        assert_eq!(object_key_from_url("not a url", None), None);
        assert_eq!(
            object_key_from_url("https://bucket.s3.amazonaws.com/", None),
            None
        );
    }

    #[test]
    fn test_object_url_round_trips_through_key_extraction() {
        let config = test_config(None, false);
        let store = offline_store(&config);
        let key = "instruments/instrument-chq-001-1700000000000-scan (1).png";

        let url = store.object_url(key);
        assert!(url.starts_with("https://inventory-assets.s3.us-east-1.amazonaws.com/instruments/"));
        assert!(!url.contains(' '));
        assert_eq!(store.key_from_url(&url).as_deref(), Some(key));
    }

    #[test]
    fn test_path_style_object_url() {
        let config = test_config(Some("http://localhost:9000/"), true);
        let store = offline_store(&config);

        let url = store.object_url("brands/brand-acme-1-logo.png");
        assert_eq!(
            url,
            "http://localhost:9000/inventory-assets/brands/brand-acme-1-logo.png"
        );
        assert_eq!(
            store.key_from_url(&url).as_deref(),
            Some("brands/brand-acme-1-logo.png")
        );
    }

    #[test]
    fn test_virtual_hosted_custom_endpoint() {
        let config = test_config(Some("https://storage.example.com:8443"), false);
        let store = offline_store(&config);

        let url = store.object_url("users/user-jane-1-me.jpg");
        assert_eq!(
            url,
            "https://inventory-assets.storage.example.com:8443/users/user-jane-1-me.jpg"
        );
        assert_eq!(
            store.key_from_url(&url).as_deref(),
            Some("users/user-jane-1-me.jpg")
        );
    }

    #[test]
    fn test_path_style_without_endpoint() {
        let config = test_config(None, true);
        let store = offline_store(&config);

        let url = store.object_url("brands/brand-acme-1-logo.png");
        assert_eq!(
            url,
            "https://s3.us-east-1.amazonaws.com/inventory-assets/brands/brand-acme-1-logo.png"
        );
        assert_eq!(
            store.key_from_url(&url).as_deref(),
            Some("brands/brand-acme-1-logo.png")
        );
    }

    #[tokio::test]
    async fn test_presigned_url_carries_configured_expiry() {
        let config = test_config(None, false);
        let store = offline_store(&config);

        let url = store
            .presign_get("brands/brand-acme-1-logo.png")
            .await
            .unwrap();

        assert!(url.contains("brands/brand-acme-1-logo.png"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
