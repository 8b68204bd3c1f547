//! Configuration management
//!
//! Configuration is read from a `config.yml` file and can be overridden with
//! `INKPRESS_*` environment variables. Every section is optional and missing
//! values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Administrator account created at startup when absent
    #[serde(default)]
    pub admin: AdminBootstrapConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/inkpress.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// In-memory cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Media root directory; blog and profile images live in subdirectories
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Days until a login session expires
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_expiration_days(),
        }
    }
}

fn default_expiration_days() -> i64 {
    7
}

/// Category classifier configuration
///
/// Classification is disabled when `api_key` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_classifier_model")]
    pub model: String,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_classifier_endpoint(),
            model: default_classifier_model(),
            timeout_seconds: default_classifier_timeout(),
        }
    }
}

fn default_classifier_endpoint() -> String {
    "https://api.openai.com/v1/responses".to_string()
}

fn default_classifier_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_classifier_timeout() -> u64 {
    15
}

impl ClassifierConfig {
    /// Whether an API key is configured
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Bootstrap administrator account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminBootstrapConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Invalid YAML
    /// is reported with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides
    ///
    /// Recognized variables:
    /// - INKPRESS_SERVER_HOST, INKPRESS_SERVER_PORT, INKPRESS_SERVER_CORS_ORIGIN
    /// - INKPRESS_DATABASE_DRIVER, INKPRESS_DATABASE_URL
    /// - INKPRESS_UPLOAD_PATH
    /// - INKPRESS_SESSION_EXPIRATION_DAYS
    /// - INKPRESS_CLASSIFIER_API_KEY, INKPRESS_CLASSIFIER_ENDPOINT, INKPRESS_CLASSIFIER_MODEL
    /// - INKPRESS_ADMIN_USERNAME, INKPRESS_ADMIN_EMAIL, INKPRESS_ADMIN_PASSWORD
    ///
    /// Values that fail to parse are ignored.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok();

        if let Some(host) = var("INKPRESS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("INKPRESS_SERVER_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(origin) = var("INKPRESS_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        if let Some(driver) = var("INKPRESS_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Some(url) = var("INKPRESS_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(path) = var("INKPRESS_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Some(days) = var("INKPRESS_SESSION_EXPIRATION_DAYS")
            .and_then(|d| d.parse::<i64>().ok())
            .filter(|d| *d > 0)
        {
            self.session.expiration_days = days;
        }

        if let Some(key) = var("INKPRESS_CLASSIFIER_API_KEY") {
            self.classifier.api_key = Some(key);
        }
        if let Some(endpoint) = var("INKPRESS_CLASSIFIER_ENDPOINT") {
            self.classifier.endpoint = endpoint;
        }
        if let Some(model) = var("INKPRESS_CLASSIFIER_MODEL") {
            self.classifier.model = model;
        }

        if let Some(username) = var("INKPRESS_ADMIN_USERNAME") {
            self.admin.username = Some(username);
        }
        if let Some(email) = var("INKPRESS_ADMIN_EMAIL") {
            self.admin.email = Some(email);
        }
        if let Some(password) = var("INKPRESS_ADMIN_PASSWORD") {
            self.admin.password = Some(password);
        }
    }
}

/// Format YAML parsing error with location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "INKPRESS_SERVER_HOST",
    "INKPRESS_SERVER_PORT",
    "INKPRESS_SERVER_CORS_ORIGIN",
    "INKPRESS_DATABASE_DRIVER",
    "INKPRESS_DATABASE_URL",
    "INKPRESS_UPLOAD_PATH",
    "INKPRESS_SESSION_EXPIRATION_DAYS",
    "INKPRESS_CLASSIFIER_API_KEY",
    "INKPRESS_CLASSIFIER_ENDPOINT",
    "INKPRESS_CLASSIFIER_MODEL",
    "INKPRESS_ADMIN_USERNAME",
    "INKPRESS_ADMIN_EMAIL",
    "INKPRESS_ADMIN_PASSWORD",
];

#[cfg(test)]
fn clear_env() {
    for name in ENV_VARS {
        std::env::remove_var(name);
    }
}
