//! Retention-schedule export.
//!
//! Reads a record-class sheet (headers in the first row) and produces the
//! JSON array of record classes with a retention period in days. Which rows
//! are dropped and how free-text periods map to days is held in a
//! [`RetentionPolicy`] so schedule revisions stay in configuration.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::workbook::Worksheet;

pub const DEFAULT_SHEET: &str = "Record Classes";
pub const DEFAULT_OUTPUT_FILE: &str = "output.json";

/// Sentinel for permanent retention.
pub const PERMANENT_DAYS: u32 = 99_999;

const DAYS_PER_YEAR: u32 = 365;

/// Date field that starts the retention clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerField {
    RecordDate,
    EventDate,
}

/// Rules for turning schedule rows into records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    pub sheet: String,
    pub code_column: String,
    pub name_column: String,
    pub description_column: String,
    pub period_column: String,
    pub business_function_column: Option<String>,
    pub retention_type_column: Option<String>,
    /// Rows whose class name contains any of these are dropped.
    pub excluded_classes: Vec<String>,
    /// Rows whose period contains any of these (case-insensitive) are dropped.
    pub skipped_units: Vec<String>,
    /// Rows whose period equals one of these are dropped.
    pub skipped_periods: Vec<String>,
    /// Class code → retention days, checked before the period.
    pub class_overrides: BTreeMap<String, u32>,
    /// Literal period → retention days.
    pub period_overrides: BTreeMap<String, u32>,
    /// Periods whose clock starts at the record date; all others use the event date.
    pub record_date_periods: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn years(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
    pairs
        .iter()
        .map(|(k, y)| (k.to_string(), y * DAYS_PER_YEAR))
        .collect()
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        let mut period_overrides = years(&[
            ("ACT+29", 29),
            ("MAX3", 3),
            ("Employee Termination + 30 years", 30),
            ("LI6", 6),
        ]);
        for permanent in ["IND", "PERM", "Life of Corporation"] {
            period_overrides.insert(permanent.to_string(), PERMANENT_DAYS);
        }

        Self {
            sheet: DEFAULT_SHEET.to_string(),
            code_column: "Record Class Code".to_string(),
            name_column: "Record Class Name".to_string(),
            description_column: "Record Class Description".to_string(),
            period_column: "Retention Period".to_string(),
            business_function_column: None,
            retention_type_column: Some("retention_type".to_string()),
            excluded_classes: strings(&["ACC205", "ACC305", "ADM165", "AUD165", "TAX125"]),
            skipped_units: strings(&["days", "months"]),
            skipped_periods: strings(&["ACT"]),
            class_overrides: years(&[
                ("CML200", 6),
                ("EHS120", 30),
                ("HRE200", 60),
                ("INV250", 75),
            ]),
            period_overrides,
            record_date_periods: strings(&["PERM", "IND", "LI", "Life of Corporation"]),
        }
    }
}

impl RetentionPolicy {
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Classify one row. `Err` carries the reason the row was dropped.
    pub fn classify(&self, code: &str, name: &str, period: &str) -> Result<u32, SkipReason> {
        let lowered = period.to_lowercase();
        if self
            .skipped_units
            .iter()
            .any(|unit| lowered.contains(&unit.to_lowercase()))
        {
            return Err(SkipReason::ShortUnit);
        }
        if self.skipped_periods.iter().any(|p| p == period) {
            return Err(SkipReason::EventOnly);
        }
        if self.excluded_classes.iter().any(|c| name.contains(c.as_str())) {
            return Err(SkipReason::ExcludedClass);
        }
        if let Some(days) = self.class_overrides.get(code) {
            return Ok(*days);
        }
        if let Some(days) = self.period_overrides.get(period) {
            return Ok(*days);
        }
        period
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|y| y.checked_mul(DAYS_PER_YEAR))
            .ok_or(SkipReason::Unparseable)
    }

    pub fn trigger_field(&self, period: &str) -> TriggerField {
        if self.record_date_periods.iter().any(|p| p == period) {
            TriggerField::RecordDate
        } else {
            TriggerField::EventDate
        }
    }
}

/// Why a schedule row produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ShortUnit,
    EventOnly,
    ExcludedClass,
    Unparseable,
}

/// One exported record class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRecord {
    pub record_class_code: String,
    pub record_class_name: String,
    pub record_class_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_function: Option<String>,
    pub retention_period: u32,
    pub retention_trigger_field: TriggerField,
    pub jurisdictional_exceptions: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_type: Option<String>,
}

/// Export result with per-reason skip counts.
#[derive(Debug, Clone, Default)]
pub struct RetentionExport {
    pub records: Vec<RetentionRecord>,
    pub skipped: BTreeMap<String, usize>,
}

impl RetentionExport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Build retention records from a schedule sheet.
pub fn export_schedule(sheet: &Worksheet, policy: &RetentionPolicy) -> CoreResult<RetentionExport> {
    let headers: HashMap<String, u32> = sheet
        .row(0)
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_text().map(|h| (h.trim().to_string(), i as u32)))
        .collect();

    let column = |name: &str| -> CoreResult<u32> {
        headers.get(name.trim()).copied().ok_or_else(|| {
            CoreError::Validation(format!(
                "Column '{name}' not found in sheet '{}'",
                sheet.name()
            ))
        })
    };

    let code_col = column(&policy.code_column)?;
    let name_col = column(&policy.name_column)?;
    let desc_col = column(&policy.description_column)?;
    let period_col = column(&policy.period_column)?;
    let function_col = policy
        .business_function_column
        .as_deref()
        .map(column)
        .transpose()?;
    // The retention-type column is optional in the sheet itself.
    let type_col = policy
        .retention_type_column
        .as_deref()
        .and_then(|name| headers.get(name.trim()).copied());

    let text = |row: u32, col: u32| sheet.cell(row, col).as_text().unwrap_or_default();

    let mut export = RetentionExport::default();
    for row in 1..sheet.height() as u32 {
        let code = text(row, code_col);
        let name = text(row, name_col);
        let period = text(row, period_col);

        let days = match policy.classify(&code, &name, &period) {
            Ok(days) => days,
            Err(reason) => {
                tracing::debug!(row = row + 1, code = %code, ?reason, "Skipping schedule row");
                *export.skipped.entry(format!("{reason:?}")).or_default() += 1;
                continue;
            }
        };

        let retention_type = type_col
            .map(|col| text(row, col))
            .filter(|t| t.trim() == "YearEnd")
            .map(|_| "YearEnd".to_string());

        export.records.push(RetentionRecord {
            record_class_code: code,
            record_class_name: name,
            record_class_description: text(row, desc_col),
            business_function: function_col.map(|col| text(row, col)),
            retention_period: days,
            retention_trigger_field: policy.trigger_field(&period),
            jurisdictional_exceptions: Vec::new(),
            retention_type,
        });
    }

    tracing::info!(
        records = export.records.len(),
        skipped = export.skipped_total(),
        "Retention schedule exported"
    );
    Ok(export)
}

/// Serialise records as a JSON array indented by four spaces.
pub fn write_records<W: Write>(records: &[RetentionRecord], writer: W) -> CoreResult<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
    records.serialize(&mut ser)?;
    Ok(())
}

/// Write records to `path`, creating parent directories.
pub fn write_records_file(records: &[RetentionRecord], path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_records(records, &mut writer)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), count = records.len(), "Wrote retention records");
    Ok(())
}
