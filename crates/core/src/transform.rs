//! Value transforms applied while mapping sheet cells to manifest fields.

use std::collections::BTreeMap;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::workbook::CellValue;

/// Width every numeric cost center is zero-padded to.
pub const COST_CENTER_WIDTH: usize = 12;

/// Tag used when a `file_tags` table has no entry for an extension.
pub const UNKNOWN_FILE_TAG: &str = "unknown";

/// A named transform applied to a raw cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    #[default]
    None,
    IsoDate,
    SecurityClassification,
    CostCenter,
    FileTag,
    Lowercase,
    DropzoneFolder,
}

/// Map a security classification label to its abbreviation.
///
/// Unrecognised or missing labels fall back to `"I"` (Internal).
pub fn security_classification(label: Option<&str>) -> &'static str {
    match label.map(str::trim) {
        Some("Confidential") => "C",
        Some("Highly Confidential") => "HC",
        Some("Internal") => "I",
        Some("Public") => "P",
        _ => "I",
    }
}

/// Format a record date as `YYYY-MM-DDT00:00:00<offset>`.
///
/// Accepts `YYYY-MM` text (resolved to the last day of that month),
/// `YYYY-MM-DD` text, or a date cell. Returns `None` for anything else.
pub fn iso_date(value: &CellValue, offset: FixedOffset) -> Option<String> {
    let date = match value {
        CellValue::Text(s) => parse_record_date(s.trim())?,
        CellValue::DateTime(dt) => dt.date(),
        _ => return None,
    };
    let midnight: NaiveDateTime = date.and_hms_opt(0, 0, 0)?;
    Some(format!(
        "{}{}",
        midnight.format("%Y-%m-%dT%H:%M:%S"),
        offset
    ))
}

fn parse_record_date(s: &str) -> Option<NaiveDate> {
    if s.len() == 7 {
        let (year, month) = s.split_once('-')?;
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        return last_day_of_month(year, month);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    let last = first_of_next.pred_opt()?;
    (last.month() == month).then_some(last)
}

/// Normalise a cost center to a 12-digit string where possible.
///
/// Numbers lose any fractional part and are zero-padded. Text is trimmed
/// and zero-padded only when it is entirely digits.
pub fn cost_center(value: &CellValue) -> Option<String> {
    let text = match value {
        CellValue::Int(n) => n.to_string(),
        CellValue::Float(f) => (f.trunc() as i64).to_string(),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Empty => return None,
        other => other.as_text()?,
    };
    if text.is_empty() {
        return None;
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{text:0>width$}", width = COST_CENTER_WIDTH))
    } else {
        Some(text)
    }
}

/// Derive a file tag from a file name.
///
/// Without a table the tag is the extension (text after the last `.`, or
/// the whole name when there is no dot). With a table the lowercase
/// extension is looked up and misses map to [`UNKNOWN_FILE_TAG`].
pub fn file_tag(file_name: &str, table: Option<&BTreeMap<String, String>>) -> String {
    let ext = file_name.rsplit('.').next().unwrap_or(file_name);
    match table {
        None => ext.to_string(),
        Some(table) => {
            if !file_name.contains('.') {
                return UNKNOWN_FILE_TAG.to_string();
            }
            table
                .get(&ext.to_lowercase())
                .cloned()
                .unwrap_or_else(|| UNKNOWN_FILE_TAG.to_string())
        }
    }
}

/// Build the drop-zone folder for a file:
/// `{root}/{publisher lowercased}/submission/{folder}/`.
pub fn dropzone_folder(root: &str, publisher: &str, folder: &str) -> String {
    format!(
        "{}/{}/submission/{}/",
        root.trim_end_matches('/'),
        publisher.trim().to_lowercase(),
        folder.trim_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn est() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    #[test]
    fn classification_known_labels() {
        assert_eq!(security_classification(Some("Confidential")), "C");
        assert_eq!(security_classification(Some("Highly Confidential")), "HC");
        assert_eq!(security_classification(Some("Internal")), "I");
        assert_eq!(security_classification(Some("Public")), "P");
    }

    #[test]
    fn classification_defaults_to_internal() {
        assert_eq!(security_classification(Some("Secret")), "I");
        assert_eq!(security_classification(None), "I");
    }

    #[test]
    fn iso_date_full_date() {
        let v = CellValue::Text("2023-04-15".into());
        assert_eq!(iso_date(&v, est()).as_deref(), Some("2023-04-15T00:00:00-05:00"));
    }

    #[test]
    fn iso_date_year_month_uses_last_day() {
        let feb = CellValue::Text("2024-02".into());
        assert_eq!(iso_date(&feb, est()).as_deref(), Some("2024-02-29T00:00:00-05:00"));
        let dec = CellValue::Text("2023-12".into());
        assert_eq!(iso_date(&dec, est()).as_deref(), Some("2023-12-31T00:00:00-05:00"));
    }

    #[test]
    fn iso_date_from_date_cell() {
        let dt = NaiveDate::from_ymd_opt(2022, 7, 1)
            .unwrap()
            .and_hms_opt(13, 5, 0)
            .unwrap();
        let v = CellValue::DateTime(dt);
        assert_eq!(iso_date(&v, est()).as_deref(), Some("2022-07-01T00:00:00-05:00"));
    }

    #[test]
    fn iso_date_rejects_garbage() {
        assert!(iso_date(&CellValue::Text("April 2023".into()), est()).is_none());
        assert!(iso_date(&CellValue::Text("2023-13".into()), est()).is_none());
        assert!(iso_date(&CellValue::Int(2023), est()).is_none());
        assert!(iso_date(&CellValue::Empty, est()).is_none());
    }

    #[test]
    fn cost_center_pads_numbers() {
        assert_eq!(cost_center(&CellValue::Int(1234)).as_deref(), Some("000000001234"));
        assert_eq!(cost_center(&CellValue::Float(1234.0)).as_deref(), Some("000000001234"));
    }

    #[test]
    fn cost_center_trims_and_pads_digit_text() {
        assert_eq!(
            cost_center(&CellValue::Text("  987 ".into())).as_deref(),
            Some("000000000987")
        );
        assert_eq!(cost_center(&CellValue::Text(" CC-12 ".into())).as_deref(), Some("CC-12"));
        assert!(cost_center(&CellValue::Empty).is_none());
    }

    #[test]
    fn file_tag_raw_extension() {
        assert_eq!(file_tag("report.PDF", None), "PDF");
        assert_eq!(file_tag("archive.tar.gz", None), "gz");
        assert_eq!(file_tag("README", None), "README");
    }

    #[test]
    fn file_tag_with_table() {
        let table: BTreeMap<String, String> = [("pdf", "pdf"), ("jpg", "image")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(file_tag("scan.JPG", Some(&table)), "image");
        assert_eq!(file_tag("notes.docx", Some(&table)), "unknown");
        assert_eq!(file_tag("README", Some(&table)), "unknown");
    }

    #[test]
    fn dropzone_folder_layout() {
        assert_eq!(
            dropzone_folder("/dropzone/a360root/", "IDF", "/QAC/2023/"),
            "/dropzone/a360root/idf/submission/QAC/2023/"
        );
    }
}
