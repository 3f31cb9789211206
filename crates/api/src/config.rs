use std::str::FromStr;

use dropzone_cloud::{BlobConfig, BlobError};

/// Errors while loading [`ServerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`; chunked downloads
    /// of large blobs take a while).
    pub request_timeout_secs: u64,
    /// Grace period for in-flight orchestrations after shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Largest accepted multipart upload body (default: 512 MiB).
    pub max_upload_bytes: usize,
    /// How long finished orchestrations stay queryable (default: `3600`).
    pub orchestration_retention_secs: u64,
    /// Most finished orchestrations kept at once (default: `1000`).
    pub orchestration_max_finished: usize,
    /// Blob backend and transfer settings.
    pub blob: BlobConfig,
}

fn parse_env<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        _ => Ok(default),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `300`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `MAX_UPLOAD_BYTES`      | `536870912`                |
    /// | `ORCHESTRATION_RETENTION_SECS` | `3600`              |
    /// | `ORCHESTRATION_MAX_FINISHED`   | `1000`              |
    ///
    /// Blob settings come from [`BlobConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port: parse_env("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 300)?,
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT_SECS", 30)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 512 * 1024 * 1024)?,
            orchestration_retention_secs: parse_env("ORCHESTRATION_RETENTION_SECS", 3600)?,
            orchestration_max_finished: parse_env("ORCHESTRATION_MAX_FINISHED", 1000)?,
            blob: BlobConfig::from_env()?,
        })
    }
}
