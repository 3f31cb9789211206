//! Declarative sheet layouts.
//!
//! A [`SheetLayout`] says which sheets to read, where the data rows start,
//! and how each manifest field is sourced: a fixed header cell, a column of
//! the current row, a literal, or the submission timestamp. Layouts are
//! plain JSON so a new spreadsheet revision needs a config change, not a
//! code change.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::transform::Transform;
use crate::workbook::CellRef;

pub const DEFAULT_SHEET_PREFIX: &str = "Metadata";
pub const DEFAULT_FIRST_DATA_ROW: u32 = 9;
pub const DEFAULT_RECORDS_PER_FILE: usize = 100;
pub const DEFAULT_DROPZONE_ROOT: &str = "/dropzone/a360root";
pub const DEFAULT_UTC_OFFSET: &str = "-05:00";
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Where a field's raw value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum FieldSource {
    /// A fixed cell on the sheet, shared by every row.
    Cell { cell: CellRef },
    /// Zero-based column of the current data row.
    Column { column: u32 },
    /// A constant string.
    Literal { value: String },
    /// The conversion timestamp.
    SubmissionDate,
}

/// One output key and how to fill it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    #[serde(flatten)]
    pub source: FieldSource,
    #[serde(default)]
    pub transform: Transform,
}

impl FieldSpec {
    fn cell(key: &str, cell: CellRef, transform: Transform) -> Self {
        Self {
            key: key.to_string(),
            source: FieldSource::Cell { cell },
            transform,
        }
    }

    fn column(key: &str, column: u32, transform: Transform) -> Self {
        Self {
            key: key.to_string(),
            source: FieldSource::Column { column },
            transform,
        }
    }

    fn literal(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            source: FieldSource::Literal {
                value: value.to_string(),
            },
            transform: Transform::None,
        }
    }
}

/// Complete description of a metadata workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    /// Only sheets whose name starts with this are converted. Empty = all.
    pub sheet_prefix: String,
    /// 1-based row of the first data row.
    pub first_data_row: u32,
    /// Column whose first empty cell ends the data rows.
    pub stop_column: u32,
    /// Record pairs per output file.
    pub records_per_file: usize,
    /// Root of the drop-zone tree used by the `dropzone_folder` transform.
    pub dropzone_root: String,
    /// Header cell holding the publisher, used by `dropzone_folder`.
    pub publisher_cell: CellRef,
    /// Offset appended to record and submission dates, e.g. `-05:00`.
    pub utc_offset: String,
    /// Record-metadata keys that must not be empty.
    pub required: Vec<String>,
    /// Optional extension → tag table for the `file_tag` transform.
    pub file_tags: Option<BTreeMap<String, String>>,
    pub record_metadata: Vec<FieldSpec>,
    pub file_metadata: Vec<FieldSpec>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        use Transform as T;

        let record_metadata = vec![
            FieldSpec::cell("record_class", CellRef::new(8, 2), T::None), // C9
            FieldSpec::cell("publisher", CellRef::new(0, 1), T::None), // B1
            FieldSpec::cell("region", CellRef::new(3, 17), T::None), // R4
            FieldSpec::column("recorddate", 3, T::IsoDate),
            FieldSpec::cell("provenance", CellRef::new(0, 3), T::None), // D1
            FieldSpec {
                key: "submission_date".to_string(),
                source: FieldSource::SubmissionDate,
                transform: T::None,
            },
            FieldSpec::cell("security_classification", CellRef::new(3, 3), T::SecurityClassification), // D4
            FieldSpec::cell("contributor", CellRef::new(1, 3), T::None), // D2
            FieldSpec::cell("creator", CellRef::new(1, 1), T::None), // B2
            FieldSpec::column("description", 4, T::None),
            FieldSpec::column("title", 0, T::None),
            FieldSpec::literal("language", DEFAULT_LANGUAGE),
            FieldSpec::cell("cost_center", CellRef::new(2, 1), T::CostCenter), // B3
            FieldSpec::column("date_range", 5, T::None),
            FieldSpec::column("major_description", 6, T::None),
            FieldSpec::column("minor_description", 7, T::None),
            FieldSpec::column("reference_1", 8, T::None),
        ];

        let file_metadata = vec![
            FieldSpec::cell("publisher", CellRef::new(0, 1), T::None), // B1
            FieldSpec::column("source_folder_path", 1, T::None),
            FieldSpec::column("source_file_name", 0, T::None),
            FieldSpec::column("dz_folder_path", 1, T::DropzoneFolder),
            FieldSpec::column("dz_file_name", 0, T::None),
            FieldSpec::column("file_tag", 0, T::FileTag),
        ];

        Self {
            sheet_prefix: DEFAULT_SHEET_PREFIX.to_string(),
            first_data_row: DEFAULT_FIRST_DATA_ROW,
            stop_column: 0,
            records_per_file: DEFAULT_RECORDS_PER_FILE,
            dropzone_root: DEFAULT_DROPZONE_ROOT.to_string(),
            publisher_cell: CellRef::new(0, 1),
            utc_offset: DEFAULT_UTC_OFFSET.to_string(),
            required: vec!["publisher".to_string()],
            file_tags: None,
            record_metadata,
            file_metadata,
        }
    }
}

impl SheetLayout {
    /// Load a layout from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let layout: Self = serde_json::from_str(&raw)?;
        layout.validate()?;
        tracing::debug!(path = %path.display(), "Loaded sheet layout");
        Ok(layout)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> CoreResult<()> {
        if self.first_data_row == 0 {
            return Err(CoreError::Validation(
                "first_data_row is 1-based and must be at least 1".into(),
            ));
        }
        if self.records_per_file == 0 {
            return Err(CoreError::Validation(
                "records_per_file must be greater than zero".into(),
            ));
        }
        self.offset()?;

        for key in &self.required {
            if !self.record_metadata.iter().any(|f| &f.key == key) {
                return Err(CoreError::Validation(format!(
                    "Required key '{key}' is not produced by record_metadata"
                )));
            }
        }
        Ok(())
    }

    /// Parsed [`utc_offset`](Self::utc_offset).
    pub fn offset(&self) -> CoreResult<FixedOffset> {
        self.utc_offset.parse::<FixedOffset>().map_err(|e| {
            CoreError::Validation(format!("Invalid utc_offset '{}': {e}", self.utc_offset))
        })
    }

    /// Whether a sheet name is selected by [`sheet_prefix`](Self::sheet_prefix).
    pub fn matches_sheet(&self, name: &str) -> bool {
        name.starts_with(&self.sheet_prefix)
    }
}
