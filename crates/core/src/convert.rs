//! Spreadsheet → manifest conversion.
//!
//! [`convert_workbook`] is pure: it maps rows of every selected sheet into
//! record pairs and batches them. [`convert_file`] adds the file-system
//! side: registry check, workbook loading, batch writing, and history.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::hashing::sha256_file;
use crate::layout::{FieldSource, FieldSpec, SheetLayout};
use crate::manifest::{batch_pairs, ManifestBatch, RecordPair};
use crate::registry::{ConversionRegistry, RegistryEntry};
use crate::transform::{self, Transform};
use crate::workbook::{CellValue, Workbook, Worksheet};

/// Rows between progress log lines.
const PROGRESS_EVERY: usize = 10;

/// Per-sheet row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSummary {
    pub sheet: String,
    pub rows: usize,
}

/// Result of converting one workbook.
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub sheets: Vec<SheetSummary>,
    pub batches: Vec<ManifestBatch>,
    /// Paths of written batch files (empty until written).
    pub written: Vec<PathBuf>,
}

impl ConversionReport {
    pub fn total_files(&self) -> usize {
        self.batches.len()
    }

    pub fn total_uploads(&self) -> usize {
        self.batches.iter().map(ManifestBatch::upload_count).sum()
    }
}

/// What [`convert_file`] did.
#[derive(Debug, Clone)]
pub enum ConversionOutcome {
    /// Same path and content were converted before.
    Skipped { previous: RegistryEntry },
    Converted(ConversionReport),
}

/// Shared per-run values threaded through row mapping.
struct RowContext<'a> {
    layout: &'a SheetLayout,
    offset: FixedOffset,
    submission_date: String,
}

/// Convert every sheet selected by `layout` into batched manifest records.
///
/// `stem` names the output files (`{stem}_{sheet}_{n}.a360`); `n` runs
/// across all sheets of the workbook starting at 0.
pub fn convert_workbook(
    workbook: &Workbook,
    stem: &str,
    layout: &SheetLayout,
    submitted_at: DateTime<FixedOffset>,
) -> CoreResult<ConversionReport> {
    layout.validate()?;

    let sheets: Vec<&Worksheet> = workbook
        .sheets()
        .iter()
        .filter(|s| layout.matches_sheet(s.name()))
        .collect();

    if sheets.is_empty() {
        return Err(CoreError::Validation(format!(
            "No sheets starting with '{}' found in the workbook",
            layout.sheet_prefix
        )));
    }
    tracing::info!(count = sheets.len(), "Found metadata sheet(s) to process");

    let ctx = RowContext {
        layout,
        offset: layout.offset()?,
        submission_date: submitted_at.format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string(),
    };

    let mut report = ConversionReport::default();
    let mut file_index = 0usize;

    for sheet in sheets {
        tracing::info!(sheet = %sheet.name(), "Processing sheet");
        let pairs = map_sheet(sheet, &ctx)?;
        report.sheets.push(SheetSummary {
            sheet: sheet.name().to_string(),
            rows: pairs.len(),
        });
        report.batches.extend(batch_pairs(
            pairs,
            stem,
            sheet.name(),
            layout.records_per_file,
            &mut file_index,
        ));
    }

    Ok(report)
}

/// Map the data rows of one sheet, stopping at the first empty stop cell.
fn map_sheet(sheet: &Worksheet, ctx: &RowContext<'_>) -> CoreResult<Vec<RecordPair>> {
    let layout = ctx.layout;
    let mut pairs = Vec::new();
    let mut row = layout.first_data_row - 1;

    while (row as usize) < sheet.height() && !sheet.cell(row, layout.stop_column).is_empty() {
        let record_metadata = map_fields(&layout.record_metadata, sheet, row, ctx)?;
        check_required(&record_metadata, layout, sheet.name(), row)?;
        let file_metadata = map_fields(&layout.file_metadata, sheet, row, ctx)?;

        pairs.push(RecordPair::new(record_metadata, file_metadata));
        if pairs.len() % PROGRESS_EVERY == 0 {
            tracing::debug!(sheet = %sheet.name(), rows = pairs.len(), "Processing rows");
        }
        row += 1;
    }

    Ok(pairs)
}

fn map_fields(
    specs: &[FieldSpec],
    sheet: &Worksheet,
    row: u32,
    ctx: &RowContext<'_>,
) -> CoreResult<Map<String, Value>> {
    let mut out = Map::with_capacity(specs.len());
    for spec in specs {
        out.insert(spec.key.clone(), resolve_field(spec, sheet, row, ctx)?);
    }
    Ok(out)
}

fn resolve_field(
    spec: &FieldSpec,
    sheet: &Worksheet,
    row: u32,
    ctx: &RowContext<'_>,
) -> CoreResult<Value> {
    let raw = match &spec.source {
        FieldSource::Cell { cell } => sheet.at(*cell).clone(),
        FieldSource::Column { column } => sheet.cell(row, *column).clone(),
        FieldSource::Literal { value } => CellValue::Text(value.clone()),
        FieldSource::SubmissionDate => return Ok(Value::String(ctx.submission_date.clone())),
    };

    let value = match spec.transform {
        Transform::None => raw.to_json(),
        Transform::IsoDate => string_or_null(transform::iso_date(&raw, ctx.offset)),
        Transform::SecurityClassification => Value::String(
            transform::security_classification(raw.as_text().as_deref()).to_string(),
        ),
        Transform::CostCenter => string_or_null(transform::cost_center(&raw)),
        Transform::FileTag => string_or_null(
            raw.as_text()
                .map(|name| transform::file_tag(&name, ctx.layout.file_tags.as_ref())),
        ),
        Transform::Lowercase => string_or_null(raw.as_text().map(|s| s.to_lowercase())),
        Transform::DropzoneFolder => {
            let publisher = sheet
                .at(ctx.layout.publisher_cell)
                .as_text()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Sheet '{}', Row {}: publisher cell {} is empty, cannot build '{}'",
                        sheet.name(),
                        row + 1,
                        ctx.layout.publisher_cell,
                        spec.key
                    ))
                })?;
            let folder = raw.as_text().unwrap_or_default();
            Value::String(transform::dropzone_folder(
                &ctx.layout.dropzone_root,
                &publisher,
                &folder,
            ))
        }
    };
    Ok(value)
}

fn string_or_null(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

fn check_required(
    metadata: &Map<String, Value>,
    layout: &SheetLayout,
    sheet: &str,
    row: u32,
) -> CoreResult<()> {
    for key in &layout.required {
        let missing = match metadata.get(key) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if missing {
            tracing::error!(sheet, row = row + 1, key = %key, "Missing required value");
            return Err(CoreError::Validation(format!(
                "Sheet '{sheet}', Row {}: Missing value for '{key}'",
                row + 1
            )));
        }
    }
    Ok(())
}

/// Convert a workbook on disk and write its batch files into `output_dir`.
///
/// Skips the file when the registry already lists the same absolute path
/// and content hash, unless `force` is set.
pub fn convert_file(
    input: &Path,
    output_dir: &Path,
    layout: &SheetLayout,
    registry: &ConversionRegistry,
    force: bool,
) -> CoreResult<ConversionOutcome> {
    let input = input.canonicalize()?;
    let file_label = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let _span = tracing::info_span!("convert", input_file = %file_label).entered();
    tracing::info!(path = %input.display(), "Starting to process workbook");

    let input_key = input.to_string_lossy().into_owned();
    let digest = sha256_file(&input)?;

    if let Some(previous) = registry.find(&input_key, &digest)? {
        if !force {
            tracing::warn!(
                converted_at = %previous.converted_at,
                "Workbook was already converted; use --force to convert again"
            );
            return Ok(ConversionOutcome::Skipped { previous });
        }
    }

    let workbook = Workbook::open(&input)?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest".to_string());

    let offset = layout.offset()?;
    let mut report = convert_workbook(&workbook, &stem, layout, Utc::now().with_timezone(&offset))?;

    std::fs::create_dir_all(output_dir)?;
    for batch in &report.batches {
        report.written.push(batch.write_into(output_dir)?);
    }

    registry.record(&input_key, &digest, Utc::now())?;
    tracing::info!(
        files = report.total_files(),
        uploads = report.total_uploads(),
        "Processing complete"
    );

    Ok(ConversionOutcome::Converted(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use serde_json::json;

    use crate::manifest::ManifestRecord;

    fn submitted() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 10, 30, 0)
            .unwrap()
    }

    /// A sheet laid out like the metadata template: header block in rows
    /// 1-4, record class in C9, data rows from row 9.
    fn metadata_sheet(name: &str, data_rows: usize) -> Worksheet {
        let mut sheet = Worksheet::new(name);
        sheet.set(0, 1, "IDF".into());
        sheet.set(0, 3, "IBM Data Factory".into());
        sheet.set(1, 1, "PT34732".into());
        sheet.set(1, 3, "PL56162".into());
        sheet.set(2, 1, CellValue::Float(4321.0));
        sheet.set(3, 17, "USA".into());
        sheet.set(3, 3, "Highly Confidential".into());

        for i in 0..data_rows {
            let row = 8 + i as u32;
            sheet.set(row, 0, format!("file{i}.pdf").into());
            sheet.set(row, 1, "QAC/2023".into());
            sheet.set(row, 2, "ADM180".into());
            sheet.set(row, 3, "2023-02".into());
            sheet.set(row, 4, "Quarterly report".into());
            sheet.set(row, 5, "2023".into());
            sheet.set(row, 6, "Finance".into());
            sheet.set(row, 7, "Reports".into());
            sheet.set(row, 8, CellValue::Int(17));
        }
        sheet
    }

    fn metadata(record: &ManifestRecord) -> &Map<String, Value> {
        match record {
            ManifestRecord::CreateRecord {
                record_metadata, ..
            } => record_metadata,
            ManifestRecord::UploadNewFile { file_metadata, .. } => file_metadata,
        }
    }

    #[test]
    fn maps_default_layout_fields() {
        let workbook = Workbook::new(vec![metadata_sheet("Metadata", 1)]);
        let report =
            convert_workbook(&workbook, "book", &SheetLayout::default(), submitted()).unwrap();

        assert_eq!(report.total_files(), 1);
        let batch = &report.batches[0];
        assert_eq!(batch.file_name, "book_Metadata_0.a360");

        let record = metadata(&batch.records[0]);
        assert_eq!(record["record_class"], json!("ADM180"));
        assert_eq!(record["publisher"], json!("IDF"));
        assert_eq!(record["region"], json!("USA"));
        assert_eq!(record["recorddate"], json!("2023-02-28T00:00:00-05:00"));
        assert_eq!(record["provenance"], json!("IBM Data Factory"));
        assert_eq!(record["submission_date"], json!("2024-03-01T10:30:00.000000-05:00"));
        assert_eq!(record["security_classification"], json!("HC"));
        assert_eq!(record["contributor"], json!("PL56162"));
        assert_eq!(record["creator"], json!("PT34732"));
        assert_eq!(record["title"], json!("file0.pdf"));
        assert_eq!(record["language"], json!("eng"));
        assert_eq!(record["cost_center"], json!("000000004321"));
        assert_eq!(record["reference_1"], json!(17));

        let keys: Vec<_> = record.keys().cloned().collect();
        assert_eq!(keys.first().map(String::as_str), Some("record_class"));
        assert_eq!(keys.last().map(String::as_str), Some("reference_1"));

        let file = metadata(&batch.records[1]);
        assert_eq!(file["source_folder_path"], json!("QAC/2023"));
        assert_eq!(file["dz_folder_path"], json!("/dropzone/a360root/idf/submission/QAC/2023/"));
        assert_eq!(file["dz_file_name"], json!("file0.pdf"));
        assert_eq!(file["file_tag"], json!("pdf"));
    }

    #[test]
    fn stops_at_first_empty_row() {
        let mut sheet = metadata_sheet("Metadata", 3);
        sheet.set(9, 0, CellValue::Empty);
        let workbook = Workbook::new(vec![sheet]);
        let report =
            convert_workbook(&workbook, "book", &SheetLayout::default(), submitted()).unwrap();
        assert_eq!(report.sheets[0].rows, 1);
    }

    #[test]
    fn only_prefixed_sheets_are_converted_and_numbering_spans_sheets() {
        let workbook = Workbook::new(vec![
            metadata_sheet("Metadata A", 3),
            metadata_sheet("Instructions", 3),
            metadata_sheet("Metadata B", 1),
        ]);
        let layout = SheetLayout {
            records_per_file: 2,
            ..SheetLayout::default()
        };
        let report = convert_workbook(&workbook, "wb", &layout, submitted()).unwrap();

        let names: Vec<_> = report.batches.iter().map(|b| b.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["wb_Metadata A_0.a360", "wb_Metadata A_1.a360", "wb_Metadata B_2.a360"]
        );
        assert_eq!(report.total_uploads(), 4);
    }

    #[test]
    fn no_matching_sheet_is_an_error() {
        let workbook = Workbook::new(vec![metadata_sheet("Sheet1", 1)]);
        let err = convert_workbook(&workbook, "wb", &SheetLayout::default(), submitted());
        assert_matches!(err, Err(CoreError::Validation(msg)) if msg.contains("Metadata"));
    }

    #[test]
    fn missing_required_value_names_sheet_and_row() {
        let mut sheet = metadata_sheet("Metadata", 2);
        sheet.set(0, 1, CellValue::Empty);
        let workbook = Workbook::new(vec![sheet]);
        let err = convert_workbook(&workbook, "wb", &SheetLayout::default(), submitted());
        assert_matches!(
            err,
            Err(CoreError::Validation(msg)) if msg == "Sheet 'Metadata', Row 9: Missing value for 'publisher'"
        );
    }

    #[test]
    fn custom_layout_literal_and_table_tags() {
        let layout: SheetLayout = serde_json::from_str(
            r#"{
                "sheet_prefix": "",
                "first_data_row": 2,
                "required": [],
                "file_tags": { "pdf": "pdf", "zip": "zip" },
                "record_metadata": [
                    { "key": "title", "from": "column", "column": 0 },
                    { "key": "publisher", "from": "literal", "value": "IDF" }
                ],
                "file_metadata": [
                    { "key": "file_tag", "from": "column", "column": 0, "transform": "file_tag" },
                    { "key": "folder", "from": "column", "column": 1, "transform": "lowercase" }
                ]
            }"#,
        )
        .unwrap();

        let sheet = Worksheet::from_rows(
            "Sheet1",
            vec![
                vec!["Name".into(), "Folder".into()],
                vec!["a.PDF".into(), "QAC".into()],
                vec!["b.docx".into(), CellValue::Empty],
            ],
        );
        let report =
            convert_workbook(&Workbook::new(vec![sheet]), "x", &layout, submitted()).unwrap();
        let records = &report.batches[0].records;
        assert_eq!(records.len(), 4);
        assert_eq!(metadata(&records[0])["publisher"], json!("IDF"));
        assert_eq!(metadata(&records[1])["file_tag"], json!("pdf"));
        assert_eq!(metadata(&records[1])["folder"], json!("qac"));
        assert_eq!(metadata(&records[3])["file_tag"], json!("unknown"));
        assert_eq!(metadata(&records[3])["folder"], Value::Null);
    }
}
