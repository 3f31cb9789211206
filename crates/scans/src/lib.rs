//! Migration of assessment scans between management servers.

pub mod client;
pub mod config;
pub mod error;
pub mod migration;

pub use client::{ScanClient, ScanDefinition};
pub use config::{AuthMode, ScanServerConfig};
pub use error::ScanError;
pub use migration::{export_scans, filter_scans, import_scans, ExportSummary, ImportResult};
