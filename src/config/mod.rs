//! Configuration module for the image asset service

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub behavior: BehaviorSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// S3 object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible backends (MinIO, R2)
    pub endpoint: Option<String>,
    /// Overrides the default https://{bucket}.s3.{region}.amazonaws.com prefix
    pub public_url_prefix: Option<String>,
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,
}

fn default_presign_expiry() -> u64 { 3600 }

/// Database configuration for PostgreSQL
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
}

/// Failure-propagation behavior for delete and list operations
#[derive(Debug, Clone, Deserialize)]
pub struct BehaviorSettings {
    /// When false (legacy-compatible), delete/list sub-failures are logged
    /// and swallowed; when true they are surfaced to the caller.
    #[serde(default)]
    pub strict_errors: bool,
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
}

fn default_page_size() -> i64 { 12 }

impl Default for BehaviorSettings {
    fn default() -> Self {
        BehaviorSettings {
            strict_errors: false,
            default_page_size: default_page_size(),
        }
    }
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with IMGVAULT_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides (gitignored)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables (IMGVAULT_SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("IMGVAULT")
                    .separator("__")
                    .try_parsing(true)
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: None,
            },
            storage: StorageSettings {
                bucket: String::new(),
                region: "us-east-1".to_string(),
                access_key_id: String::new(),
                secret_access_key: String::new(),
                endpoint: None,
                public_url_prefix: None,
                presign_expiry_secs: default_presign_expiry(),
            },
            database: DatabaseSettings {
                url: String::new(),
                max_connections: Some(10),
            },
            behavior: BehaviorSettings::default(),
        }
    }
}
