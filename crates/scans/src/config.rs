use std::str::FromStr;

use crate::error::ScanError;

/// Default path (relative to the base URL) of the scan collection.
pub const DEFAULT_SCANS_PATH: &str = "conf/assessment/scans";

/// Default path new scans are POSTed to.
pub const DEFAULT_CREATE_PATH: &str = "scans";

/// How the session request carries credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// `Authorization: Basic …` header with an empty body.
    #[default]
    Basic,
    /// `{"username": …, "password": …}` JSON body.
    Json,
}

impl FromStr for AuthMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "json" => Ok(Self::Json),
            other => Err(ScanError::Config(format!(
                "auth mode must be 'basic' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Connection settings for one management server.
#[derive(Debug, Clone)]
pub struct ScanServerConfig {
    /// API root, e.g. `https://mx01:8083/SecureSphere/api/v1`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub auth_mode: AuthMode,
    /// Management servers usually present self-signed certificates.
    pub accept_invalid_certs: bool,
    pub scans_path: String,
    pub create_path: String,
}

impl ScanServerConfig {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            auth_mode: AuthMode::default(),
            accept_invalid_certs: true,
            scans_path: DEFAULT_SCANS_PATH.to_string(),
            create_path: DEFAULT_CREATE_PATH.to_string(),
        }
    }

    /// Settings for a server addressed by host name or IP.
    pub fn for_host(host: &str, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(base_url_for_host(host), username, password)
    }
}

pub fn base_url_for_host(host: &str) -> String {
    format!("https://{}:8083/SecureSphere/api/v1", host.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_expands_to_management_api_root() {
        let config = ScanServerConfig::for_host("mx01.corp", "admin", "pw");
        assert_eq!(config.base_url, "https://mx01.corp:8083/SecureSphere/api/v1");
        assert_eq!(config.scans_path, "conf/assessment/scans");
        assert_eq!(config.auth_mode, AuthMode::Basic);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = ScanServerConfig::new("http://localhost:9000/api/", "u", "p");
        assert_eq!(config.base_url, "http://localhost:9000/api");
    }

    #[test]
    fn auth_mode_parses_case_insensitively() {
        assert_eq!("JSON".parse::<AuthMode>().unwrap(), AuthMode::Json);
        assert!("token".parse::<AuthMode>().is_err());
    }
}
