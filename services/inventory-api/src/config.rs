use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the inventory API
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// S3 configuration
    pub s3: S3Config,
    /// Upload limits
    #[serde(default)]
    pub upload: UploadConfig,
    /// Object cleanup worker configuration
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging and the health endpoint
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket holding uploaded images
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Static access key; the default provider chain is used when absent
    pub access_key_id: Option<String>,
    /// Static secret key
    pub secret_access_key: Option<String>,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Presigned URL expiration in seconds
    #[serde(default = "default_presigned_url_expiry_secs")]
    pub presigned_url_expiry_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Limits applied to uploaded images
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes (5MB default)
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: usize,
}

/// Background cleanup of superseded storage objects
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between sweeps of the pending deletion queue
    #[serde(default = "default_cleanup_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Jobs picked up per sweep
    #[serde(default = "default_cleanup_batch_size")]
    pub batch_size: i64,
    /// Attempts after which a job is left for manual inspection
    #[serde(default = "default_cleanup_max_attempts")]
    pub max_attempts: i32,
}

// Default value functions
fn default_service_name() -> String {
    "inventory-api".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presigned_url_expiry_secs() -> u64 {
    3600
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_file_size() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_cleanup_poll_interval_secs() -> u64 {
    30
}

fn default_cleanup_batch_size() -> i64 {
    50
}

fn default_cleanup_max_attempts() -> i32 {
    10
}

impl Config {
    /// Load configuration from config files and the environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/inventory").required(false))
            .add_source(config::File::with_name("/etc/inventory-api/config").required(false))
            // INVENTORY__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("INVENTORY")
                    .separator("__")
                    .try_parsing(true),
            )
            // Conventional deployment variables win over everything else
            .set_override_option("api.port", env_var("PORT"))?
            .set_override_option("database.url", env_var("DATABASE_URL"))?
            .set_override_option("s3.region", env_var("AWS_REGION"))?
            .set_override_option("s3.access_key_id", env_var("AWS_ACCESS_KEY_ID"))?
            .set_override_option("s3.secret_access_key", env_var("AWS_SECRET_ACCESS_KEY"))?
            .set_override_option("s3.bucket", env_var("AWS_S3_BUCKET"))?
            .set_override_option("s3.endpoint_url", env_var("AWS_ENDPOINT_URL"))?
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Get cleanup sweep interval as Duration
    pub fn cleanup_poll_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup.poll_interval_secs)
    }
}

impl DatabaseConfig {
    /// Pool acquire timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Pool idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl S3Config {
    /// Presigned URL expiry as Duration
    pub fn presigned_url_expiry(&self) -> Duration {
        Duration::from_secs(self.presigned_url_expiry_secs)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_cleanup_poll_interval_secs(),
            batch_size: default_cleanup_batch_size(),
            max_attempts: default_cleanup_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_api_port(), 3000);
        assert_eq!(default_presigned_url_expiry_secs(), 3600);
        assert_eq!(default_max_file_size(), 5 * 1024 * 1024);
    }

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres://localhost/inventory"

            [s3]
            bucket = "inventory-assets"
            "#,
        );

        assert_eq!(config.service.name, "inventory-api");
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.s3.region, "us-east-1");
        assert!(config.s3.access_key_id.is_none());
        assert_eq!(config.s3.presigned_url_expiry(), Duration::from_secs(3600));
        assert_eq!(config.upload.max_file_size_bytes, 5 * 1024 * 1024);
        assert_eq!(config.cleanup.max_attempts, 10);
        assert!(config.database.run_migrations);
        assert_eq!(
            config.database.connect_timeout(),
            Duration::from_secs(config.database.connect_timeout_secs)
        );
        assert_eq!(
            config.database.idle_timeout(),
            Duration::from_secs(config.database.idle_timeout_secs)
        );
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config = from_toml(
            r#"
            [api]
            port = 8080
            cors_origins = ["https://admin.example.com"]

            [database]
            url = "postgres://localhost/inventory"
            max_connections = 25

            [s3]
            bucket = "assets"
            endpoint_url = "http://localhost:9000"
            force_path_style = true
            presigned_url_expiry_secs = 600
            "#,
        );

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.cors_origins.len(), 1);
        assert_eq!(config.database.max_connections, 25);
        assert!(config.s3.force_path_style);
        assert_eq!(config.s3.presigned_url_expiry(), Duration::from_secs(600));
    }
}
