//! Export scans from one server and import them into another.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::client::{ScanClient, ScanDefinition};
use crate::error::ScanError;

/// Files written by [`export_scans`] plus counts for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub scans_file: PathBuf,
    pub detailed_file: PathBuf,
    pub failed_file: PathBuf,
    pub matched: usize,
    pub detailed: usize,
    pub failed: Vec<String>,
}

/// Outcome of creating one scan during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub name: String,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Keep scans whose `name` contains `keyword`, deduplicated by name.
///
/// A repeated name keeps the position of its first occurrence and the
/// value of its last.
pub fn filter_scans(scans: Vec<ScanDefinition>, keyword: &str) -> Vec<ScanDefinition> {
    let mut unique: IndexMap<String, ScanDefinition> = IndexMap::new();
    for scan in scans {
        let Some(name) = scan.get("name").and_then(Value::as_str) else {
            continue;
        };
        if name.contains(keyword) {
            unique.insert(name.to_string(), scan);
        }
    }
    unique.into_values().collect()
}

async fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ScanError> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Fetch, filter, and fetch details for every scan matching `keyword`,
/// writing the three result files into `out_dir`.
pub async fn export_scans(
    client: &ScanClient,
    keyword: &str,
    out_dir: &Path,
) -> Result<ExportSummary, ScanError> {
    tokio::fs::create_dir_all(out_dir).await?;

    let scans = filter_scans(client.list_scans().await?, keyword);
    let scans_file = out_dir.join(format!("scans_{keyword}.json"));
    write_pretty(&scans_file, &scans).await?;
    tracing::info!(keyword, count = scans.len(), file = %scans_file.display(), "Saved filtered scans");

    let mut detailed = Vec::new();
    let mut failed = Vec::new();
    for scan in &scans {
        let Some(name) = scan.get("name").and_then(Value::as_str) else {
            continue;
        };
        tracing::debug!(name, "Fetching scan details");
        match client.scan_details(name).await {
            Ok(details) => detailed.push(details),
            Err(e) => {
                tracing::warn!(name, error = %e, "Failed to fetch scan details");
                failed.push(name.to_string());
            }
        }
    }

    let detailed_file = out_dir.join(format!("detailed_{keyword}_scans.json"));
    let failed_file = out_dir.join(format!("failed_{keyword}_scans.json"));
    write_pretty(&detailed_file, &detailed).await?;
    write_pretty(&failed_file, &failed).await?;
    tracing::info!(
        detailed = detailed.len(),
        failed = failed.len(),
        "Saved detailed and failed scans"
    );

    Ok(ExportSummary {
        scans_file,
        detailed_file,
        failed_file,
        matched: scans.len(),
        detailed: detailed.len(),
        failed,
    })
}

/// Read scan definitions from a JSON file holding one object or an array.
pub fn load_definitions(path: &Path) -> Result<Vec<ScanDefinition>, ScanError> {
    let raw = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(scan) => Ok(vec![scan]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(scan) => Ok(scan),
                other => Err(ScanError::UnexpectedResponse(format!(
                    "scan definition is not an object: {other}"
                ))),
            })
            .collect(),
        _ => Err(ScanError::UnexpectedResponse(format!(
            "'{}' holds neither a scan nor a list of scans",
            path.display()
        ))),
    }
}

/// Create every scan in `details`. A failure is recorded and the rest
/// continue.
pub async fn import_scans(client: &ScanClient, details: &[ScanDefinition]) -> Vec<ImportResult> {
    let mut results = Vec::with_capacity(details.len());
    for scan in details {
        let name = scan
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();

        match client.create_scan(scan).await {
            Ok(()) => results.push(ImportResult {
                name,
                created: true,
                error: None,
            }),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Failed to create scan");
                results.push(ImportResult {
                    name,
                    created: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    results
}
