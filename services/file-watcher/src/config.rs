//! Configuration for the file watcher service.
//!
//! Values are layered from built-in defaults, optional config files,
//! `FILE_WATCHER__*` environment variables, and finally the legacy deployment
//! variables / command-line flags captured in [`Overrides`].

use ::config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while assembling the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ::config::ConfigError),
}

/// Main configuration for the file watcher
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatcherConfig {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Ingest gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Poll loop configuration
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; metrics are not exported when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// S3 bucket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket to watch. Required.
    #[serde(default)]
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Static access key; the default AWS credential chain is used when unset
    #[serde(default)]
    pub access_key: Option<String>,
    /// Static secret key
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Storage domain reported to the gateway in job locations
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
}

/// How the job document is carried in the POST body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    /// Multipart form with a single `body` field holding the JSON document
    #[default]
    Multipart,
    /// Raw `application/json` body
    Json,
}

/// Ingest gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host, optionally with scheme and port
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Scheme used when `host` carries none
    #[serde(default = "default_gateway_scheme")]
    pub scheme: String,
    /// API key sent as the job identity
    #[serde(default)]
    pub api_key: Option<String>,
    /// User name sent as the job identity instead of the API key
    #[serde(default)]
    pub user_name: Option<String>,
    /// Basic auth user
    #[serde(default)]
    pub basic_auth_user: Option<String>,
    /// Basic auth password
    #[serde(default)]
    pub basic_auth_password: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Body encoding for job submissions
    #[serde(default)]
    pub body_encoding: BodyEncoding,
}

/// Poll loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Seconds between bucket scans
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// File holding the names of files already submitted
    #[serde(default = "default_ingested_file")]
    pub ingested_file: PathBuf,
}

/// Highest-precedence values taken from the command line or legacy env vars
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bucket: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub api_key: Option<String>,
    pub gateway_host: Option<String>,
}

// Default value functions
fn default_service_name() -> String {
    "file-watcher".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_domain_name() -> String {
    "s3.amazonaws.com".to_string()
}

fn default_gateway_host() -> String {
    "pz-gateway.cf.piazzageo.io".to_string()
}

fn default_gateway_scheme() -> String {
    "http".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    5
}

fn default_ingested_file() -> PathBuf {
    PathBuf::from("IngestedFiles.txt")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            access_key: None,
            secret_key: None,
            domain_name: default_domain_name(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            scheme: default_gateway_scheme(),
            api_key: None,
            user_name: None,
            basic_auth_user: None,
            basic_auth_password: None,
            request_timeout_secs: default_request_timeout_secs(),
            body_encoding: BodyEncoding::default(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            ingested_file: default_ingested_file(),
        }
    }
}

impl WatcherConfig {
    /// Load configuration from config files, environment, and overrides
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let builder = ::config::Config::builder()
            .add_source(::config::File::with_name("config/file-watcher").required(false))
            .add_source(
                ::config::File::with_name("/etc/file-watcher/file-watcher").required(false),
            )
            // FILE_WATCHER__STORAGE__BUCKET -> storage.bucket
            .add_source(
                ::config::Environment::with_prefix("FILE_WATCHER")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::load_from(builder, overrides)
    }

    fn load_from(
        builder: ConfigBuilder<DefaultState>,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        let mut config: WatcherConfig = builder.build()?.try_deserialize()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line / legacy environment overrides
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(ref bucket) = overrides.bucket {
            self.storage.bucket = bucket.clone();
        }
        if let Some(ref access_key) = overrides.access_key {
            self.storage.access_key = Some(access_key.clone());
        }
        if let Some(ref secret_key) = overrides.secret_key {
            self.storage.secret_key = Some(secret_key.clone());
        }
        if let Some(ref api_key) = overrides.api_key {
            self.gateway.api_key = Some(api_key.clone());
        }
        if let Some(ref host) = overrides.gateway_host {
            self.gateway.host = host.clone();
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::MissingRequired("storage.bucket".to_string()));
        }

        if self.polling.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "polling.interval_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.gateway.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "gateway.request_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }
}

impl GatewayConfig {
    /// Full URL of the job submission endpoint
    pub fn job_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.contains("://") {
            format!("{}/job", host)
        } else {
            format!("{}://{}/job", self.scheme, host)
        }
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
