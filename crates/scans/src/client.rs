//! REST client for the assessment-scan management API.
//!
//! One [`ScanClient`] holds one authenticated session: the cookie set by
//! `POST /auth/session` is kept in the client's cookie store and sent on
//! every later call.

use serde_json::{Map, Value};

use crate::config::{AuthMode, ScanServerConfig};
use crate::error::ScanError;

/// Fields a scan definition must carry before it can be created.
pub const REQUIRED_SCAN_FIELDS: [&str; 5] = ["name", "policy", "dbType", "apply-to", "scheduling"];

pub type ScanDefinition = Map<String, Value>;

pub struct ScanClient {
    client: reqwest::Client,
    config: ScanServerConfig,
}

impl ScanClient {
    pub fn new(config: ScanServerConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ScanServerConfig {
        &self.config
    }

    /// Open a session. Must succeed before any other call.
    pub async fn authenticate(&self) -> Result<(), ScanError> {
        let request = self.client.post(self.url("auth/session")?);
        let request = match self.config.auth_mode {
            AuthMode::Basic => request
                .basic_auth(&self.config.username, Some(&self.config.password))
                .header(reqwest::header::CONTENT_TYPE, "application/json"),
            AuthMode::Json => request.json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            })),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ScanError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(base_url = %self.config.base_url, "Authenticated with scan server");
        Ok(())
    }

    /// Every scan in the collection. Entries that are not JSON objects are
    /// skipped.
    pub async fn list_scans(&self) -> Result<Vec<ScanDefinition>, ScanError> {
        let response = self
            .client
            .get(self.url(&self.config.scans_path)?)
            .send()
            .await?;
        let body: Value = Self::parse_response(response).await?;

        let Value::Array(items) = body else {
            return Err(ScanError::UnexpectedResponse(
                "scan list is not a JSON array".into(),
            ));
        };

        let mut scans = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(scan) => scans.push(scan),
                other => tracing::warn!(entry = %other, "Skipping invalid scan entry"),
            }
        }
        tracing::info!(count = scans.len(), "Fetched scan list");
        Ok(scans)
    }

    /// Full definition of one scan, looked up by name.
    pub async fn scan_details(&self, name: &str) -> Result<Value, ScanError> {
        let mut url = self.url(&self.config.scans_path)?;
        url.path_segments_mut()
            .map_err(|_| ScanError::Config(format!("'{}' cannot be a base URL", self.config.base_url)))?
            .push(name);

        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    /// Create a scan on the server after checking its required fields.
    pub async fn create_scan(&self, details: &ScanDefinition) -> Result<(), ScanError> {
        validate_scan(details)?;

        let response = self
            .client
            .post(self.url(&self.config.create_path)?)
            .json(details)
            .send()
            .await?;
        Self::ensure_success(response).await?;

        tracing::info!(name = ?details.get("name"), "Scan created");
        Ok(())
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> Result<reqwest::Url, ScanError> {
        let raw = format!("{}/{}", self.config.base_url, path.trim_start_matches('/'));
        reqwest::Url::parse(&raw).map_err(|e| ScanError::Config(format!("invalid URL '{raw}': {e}")))
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ScanError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ScanError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ScanError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Check that `details` has every field in [`REQUIRED_SCAN_FIELDS`].
pub fn validate_scan(details: &ScanDefinition) -> Result<(), ScanError> {
    match REQUIRED_SCAN_FIELDS
        .iter()
        .find(|field| !details.contains_key(**field))
    {
        Some(field) => Err(ScanError::MissingField(*field)),
        None => Ok(()),
    }
}
