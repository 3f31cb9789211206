//! Manifest records and batch files.
//!
//! A manifest file is line-delimited JSON: one compact record per line.
//! Every spreadsheet row yields a `create_record` / `upload_new_file` pair
//! that share a `relation_id`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreResult;

/// Extension of manifest batch files.
pub const MANIFEST_EXTENSION: &str = "a360";

/// Field of `file_metadata` listing the drop-zone file name.
pub const DZ_FILE_NAME_KEY: &str = "dz_file_name";

/// One line of a manifest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ManifestRecord {
    CreateRecord {
        relation_id: String,
        record_metadata: Map<String, Value>,
    },
    UploadNewFile {
        relation_id: String,
        file_metadata: Map<String, Value>,
    },
}

impl ManifestRecord {
    pub fn relation_id(&self) -> &str {
        match self {
            Self::CreateRecord { relation_id, .. } | Self::UploadNewFile { relation_id, .. } => {
                relation_id
            }
        }
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, Self::UploadNewFile { .. })
    }
}

/// The two records produced for a single spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPair {
    pub relation_id: String,
    pub record_metadata: Map<String, Value>,
    pub file_metadata: Map<String, Value>,
}

impl RecordPair {
    /// Build a pair with a fresh UUID v4 relation id.
    pub fn new(record_metadata: Map<String, Value>, file_metadata: Map<String, Value>) -> Self {
        Self {
            relation_id: uuid::Uuid::new_v4().to_string(),
            record_metadata,
            file_metadata,
        }
    }

    pub fn into_records(self) -> [ManifestRecord; 2] {
        [
            ManifestRecord::CreateRecord {
                relation_id: self.relation_id.clone(),
                record_metadata: self.record_metadata,
            },
            ManifestRecord::UploadNewFile {
                relation_id: self.relation_id,
                file_metadata: self.file_metadata,
            },
        ]
    }
}

/// A group of records destined for one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestBatch {
    pub file_name: String,
    pub sheet: String,
    pub records: Vec<ManifestRecord>,
}

impl ManifestBatch {
    /// Number of `upload_new_file` operations in the batch.
    pub fn upload_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_upload()).count()
    }

    /// `dz_file_name` of every upload in the batch, in order.
    pub fn dz_file_names(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| match r {
                ManifestRecord::UploadNewFile { file_metadata, .. } => file_metadata
                    .get(DZ_FILE_NAME_KEY)
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }),
                ManifestRecord::CreateRecord { .. } => None,
            })
            .collect()
    }

    /// Serialise the batch as line-delimited compact JSON.
    pub fn write_to<W: Write>(&self, mut writer: W) -> CoreResult<()> {
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the batch into `dir` under its [`file_name`](Self::file_name).
    pub fn write_into(&self, dir: &Path) -> CoreResult<PathBuf> {
        let path = dir.join(&self.file_name);
        let file = File::create(&path)?;
        self.write_to(BufWriter::new(file))?;

        tracing::info!(
            file = %self.file_name,
            uploads = self.upload_count(),
            sheet = %self.sheet,
            "Created manifest file"
        );
        for name in self.dz_file_names() {
            tracing::debug!(file = %self.file_name, dz_file_name = %name, "Upload entry");
        }
        Ok(path)
    }
}

/// `{stem}_{sheet}_{index}.a360`
pub fn batch_file_name(stem: &str, sheet: &str, index: usize) -> String {
    format!("{stem}_{sheet}_{index}.{MANIFEST_EXTENSION}")
}

/// Split record pairs into batches of at most `pairs_per_file` pairs.
///
/// `next_index` is the file counter for the workbook; it is advanced once
/// per batch so numbering continues across sheets.
pub fn batch_pairs(
    pairs: Vec<RecordPair>,
    stem: &str,
    sheet: &str,
    pairs_per_file: usize,
    next_index: &mut usize,
) -> Vec<ManifestBatch> {
    let pairs_per_file = pairs_per_file.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<ManifestRecord> = Vec::with_capacity(pairs_per_file * 2);

    for pair in pairs {
        current.extend(pair.into_records());
        if current.len() >= pairs_per_file * 2 {
            batches.push(ManifestBatch {
                file_name: batch_file_name(stem, sheet, *next_index),
                sheet: sheet.to_string(),
                records: std::mem::take(&mut current),
            });
            *next_index += 1;
        }
    }

    if !current.is_empty() {
        batches.push(ManifestBatch {
            file_name: batch_file_name(stem, sheet, *next_index),
            sheet: sheet.to_string(),
            records: current,
        });
        *next_index += 1;
    }

    batches
}
