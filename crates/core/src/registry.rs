//! Conversion history.
//!
//! Each successful conversion appends `path,sha256,timestamp` to a registry
//! file. A workbook whose absolute path and content hash are already listed
//! is skipped unless the caller forces a rerun.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::CoreResult;

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "DROPZONE_STATE_DIR";

const DEFAULT_STATE_DIR: &str = ".dropzone";
const REGISTRY_FILE: &str = "conversion_registry";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One line of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub path: String,
    pub sha256: String,
    pub converted_at: String,
}

impl RegistryEntry {
    /// Parse `path,sha256,timestamp`. The path may itself contain commas.
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().rsplitn(3, ',');
        let converted_at = parts.next()?.to_string();
        let sha256 = parts.next()?.to_string();
        let path = parts.next()?.to_string();
        if path.is_empty() || sha256.is_empty() {
            return None;
        }
        Some(Self {
            path,
            sha256,
            converted_at,
        })
    }
}

/// Append-only registry of converted workbooks.
#[derive(Debug, Clone)]
pub struct ConversionRegistry {
    path: PathBuf,
}

impl ConversionRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry under `$DROPZONE_STATE_DIR` (default `.dropzone`).
    pub fn from_env() -> Self {
        let dir = std::env::var(STATE_DIR_ENV).unwrap_or_else(|_| DEFAULT_STATE_DIR.into());
        Self::new(Path::new(&dir).join(REGISTRY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All well-formed entries. A missing registry file means no history.
    pub fn entries(&self) -> CoreResult<Vec<RegistryEntry>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(raw.lines().filter_map(RegistryEntry::parse).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// The first entry matching both path and hash.
    pub fn find(&self, path: &str, sha256: &str) -> CoreResult<Option<RegistryEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|e| e.path == path && e.sha256 == sha256))
    }

    /// Append an entry, creating the registry directory if needed.
    pub fn record(&self, path: &str, sha256: &str, at: DateTime<Utc>) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{path},{sha256},{}", at.format(TIMESTAMP_FORMAT))?;
        Ok(())
    }
}
