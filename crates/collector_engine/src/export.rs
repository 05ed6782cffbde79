use std::path::PathBuf;

use chrono::NaiveDate;
use collector_logging::collector_info;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::Value;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::ItemRecord;

/// Output columns, in order.
pub const DEFAULT_FIELDS: [&str; 11] = [
    "ENTRPS",
    "PRDUCT",
    "STTEMNT_NO",
    "REGIST_DT",
    "DISTB_PD",
    "SUNGSANG",
    "SRV_USE",
    "PRSRV_PD",
    "INTAKE_HINT1",
    "MAIN_FNCTN",
    "BASE_STANDARD",
];

/// Longest text kept in a single cell. Excel's own limit is 32,767.
pub const MAX_CELL_CHARS: usize = 32_000;

/// Rows available below the header row in one sheet.
const MAX_DATA_ROWS: usize = 1_048_575;

/// Integers beyond this lose precision as an Excel number.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub fields: Vec<String>,
    pub sheet_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            sheet_name: "Sheet1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Nothing to write; no file was created.
    Skipped,
    Written(ExportSummary),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("{rows} rows do not fit in one sheet (max {max})", max = MAX_DATA_ROWS)]
    TooManyRows { rows: usize },
}

/// A single output cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => {
                let exact = n.as_u64().map_or(true, |u| u <= MAX_SAFE_INTEGER)
                    && n.as_i64().map_or(true, |i| i.unsigned_abs() <= MAX_SAFE_INTEGER);
                match n.as_f64() {
                    Some(f) if exact => CellValue::Number(f),
                    _ => CellValue::Text(n.to_string()),
                }
            }
            Value::String(s) => text_cell(s),
            nested => text_cell(&nested.to_string()),
        }
    }
}

fn text_cell(raw: &str) -> CellValue {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(cleaned)
    }
}

/// Collapses every whitespace run (newlines and tabs included) into one space
/// and truncates to [`MAX_CELL_CHARS`] characters.
pub fn clean_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_CELL_CHARS));
    let mut kept = 0;
    let mut prev_space = false;
    for c in input.chars() {
        let c = if c.is_whitespace() {
            if prev_space {
                continue;
            }
            prev_space = true;
            ' '
        } else {
            prev_space = false;
            c
        };
        if kept == MAX_CELL_CHARS {
            break;
        }
        out.push(c);
        kept += 1;
    }
    out
}

/// Projects a record onto `fields`; missing fields become empty cells and
/// anything not listed is dropped.
pub fn project_record(record: &ItemRecord, fields: &[String]) -> Vec<CellValue> {
    fields
        .iter()
        .map(|field| {
            record
                .get(field)
                .map(CellValue::from_json)
                .unwrap_or(CellValue::Empty)
        })
        .collect()
}

/// `api_data_<YYYYMMDD>.xlsx`
pub fn export_filename(date: NaiveDate) -> String {
    format!("api_data_{}.xlsx", date.format("%Y%m%d"))
}

/// Renders the header plus one row per record as an xlsx package.
pub fn build_workbook(
    records: &[ItemRecord],
    fields: &[String],
    sheet_name: &str,
) -> Result<Vec<u8>, ExportError> {
    if records.len() > MAX_DATA_ROWS {
        return Err(ExportError::TooManyRows {
            rows: records.len(),
        });
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    let header = Format::new().set_bold();
    for (col, field) in fields.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, field.as_str(), &header)?;
    }

    for (idx, record) in records.iter().enumerate() {
        let row = idx as u32 + 1;
        for (col, cell) in project_record(record, fields).into_iter().enumerate() {
            let col = col as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(text) => {
                    sheet.write_string(row, col, text)?;
                }
                CellValue::Number(n) => {
                    sheet.write_number(row, col, n)?;
                }
                CellValue::Bool(b) => {
                    sheet.write_boolean(row, col, b)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Writes `records` to `{output_dir}/api_data_<date>.xlsx`, replacing any file
/// of that name. An empty dataset writes nothing.
pub fn export_records(
    records: &[ItemRecord],
    options: &ExportOptions,
    date: NaiveDate,
) -> Result<ExportOutcome, ExportError> {
    if records.is_empty() {
        collector_info!("no records collected; skipping export");
        return Ok(ExportOutcome::Skipped);
    }

    let buffer = build_workbook(records, &options.fields, &options.sheet_name)?;
    let writer = AtomicFileWriter::new(options.output_dir.clone());
    let output_path = writer.write(&export_filename(date), &buffer)?;
    collector_info!(
        "wrote {} rows to {}",
        records.len(),
        output_path.display()
    );

    Ok(ExportOutcome::Written(ExportSummary {
        rows: records.len(),
        output_path,
    }))
}
