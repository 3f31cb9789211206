//! In-memory spreadsheet model.
//!
//! Workbooks are read once through [`calamine`] and copied into a plain
//! grid of [`CellValue`]s so the conversion code never touches the reader
//! directly and tests can build sheets by hand.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A single cell value after reading.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    /// `true` for missing cells and text that is blank after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual rendering used by transforms that operate on strings.
    ///
    /// Integral floats render without a fractional part (`12.0` → `"12"`).
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(f) => Some(format_float(*f)),
            Self::Bool(b) => Some(b.to_string()),
            Self::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }

    /// JSON rendering of the raw value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Empty => serde_json::Value::Null,
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                serde_json::Value::from(*f as i64)
            }
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::DateTime(_) => self
                .as_text()
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Self::Empty,
            Data::String(s) => Self::Text(s.clone()),
            Data::Int(n) => Self::Int(*n),
            Data::Float(f) => Self::Float(*f),
            Data::Bool(b) => Self::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(Self::DateTime)
                .unwrap_or(Self::Float(dt.as_f64())),
            Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .map(Self::DateTime)
                .unwrap_or_else(|_| Self::Text(s.clone())),
            Data::DurationIso(s) => Self::Text(s.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Cell references
// ---------------------------------------------------------------------------

/// An A1-style cell coordinate, stored zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl FromStr for CellRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| CoreError::Validation(format!("Invalid cell reference '{s}'")))?;
        let (letters, digits) = s.split_at(split);

        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::Validation(format!(
                "Invalid cell reference '{s}'"
            )));
        }

        let invalid = || CoreError::Validation(format!("Invalid cell reference '{s}'"));
        let mut col: u32 = 0;
        for c in letters.chars() {
            let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
            col = col
                .checked_mul(26)
                .and_then(|c| c.checked_add(digit))
                .ok_or_else(invalid)?;
        }

        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(CoreError::Validation(format!(
                "Invalid cell reference '{s}': rows start at 1"
            )));
        }

        Ok(Self {
            row: row - 1,
            col: col - 1,
        })
    }
}

impl TryFrom<String> for CellRef {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CellRef> for String {
    fn from(cell: CellRef) -> Self {
        cell.to_string()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut letters = Vec::new();
        let mut n = u64::from(self.col) + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        let column: String = letters.into_iter().rev().collect();
        write!(f, "{column}{}", u64::from(self.row) + 1)
    }
}

// ---------------------------------------------------------------------------
// Worksheet / Workbook
// ---------------------------------------------------------------------------

/// A named sheet addressed by absolute zero-based `(row, col)`.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Build a sheet from row-major values starting at `A1`.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows that hold any cell (including trailing empties).
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: u32, col: u32) -> &CellValue {
        self.rows
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn at(&self, cell: CellRef) -> &CellValue {
        self.cell(cell.row, cell.col)
    }

    pub fn row(&self, row: u32) -> &[CellValue] {
        self.rows
            .get(row as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        let (row, col) = (row as usize, col as usize);
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
    }
}

/// An ordered collection of worksheets.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Worksheet>) -> Self {
        Self { sheets }
    }

    /// Read every sheet of an `.xlsx`, `.xls`, or `.ods` file.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let mut reader = open_workbook_auto(path)
            .map_err(|e| CoreError::Workbook(format!("{}: {e}", path.display())))?;

        let mut sheets = Vec::new();
        for name in reader.sheet_names() {
            let range = reader
                .worksheet_range(&name)
                .map_err(|e| CoreError::Workbook(format!("sheet '{name}': {e}")))?;

            let mut sheet = Worksheet::new(name.clone());
            let (row0, col0) = range.start().unwrap_or((0, 0));
            for (r, c, data) in range.used_cells() {
                sheet.set(row0 + r as u32, col0 + c as u32, CellValue::from(data));
            }
            sheets.push(sheet);
        }

        tracing::debug!(path = %path.display(), sheets = sheets.len(), "Workbook loaded");
        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
