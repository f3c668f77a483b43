use crate::dataset::Dataset;
use crate::error::{AppError, Result};
use crate::value::CellValue;
use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord};
use std::io::Cursor;
use std::path::Path;

/// Header row used by the registers this tool was built for: the first row
/// holds a title, the second the column names.
pub const DEFAULT_HEADER_ROW: usize = 1;

/// Load an asset register from a file on disk
///
/// The format is chosen from the file extension (`.xlsx`, `.xlsm`, `.xls`,
/// `.ods` or `.csv`).
///
/// # Arguments
/// * `filepath` - Path to the file to load
/// * `header_row` - Zero-based sheet row holding the column names
///
/// # Returns
/// * The prepared dataset, or a load error the user should see
///
/// # Examples
/// ```no_run
/// use asset_register::loader::{load_register, DEFAULT_HEADER_ROW};
///
/// match load_register("register.xlsx", DEFAULT_HEADER_ROW) {
///     Ok(ds) => println!("{} assets", ds.len()),
///     Err(e) => eprintln!("Error loading register: {}", e),
/// }
/// ```
pub fn load_register(filepath: impl AsRef<Path>, header_row: usize) -> Result<Dataset> {
    let path = filepath.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = std::fs::read(path).map_err(|e| AppError::Load(format!("{}: {}", name, e)))?;
    load_register_bytes(&name, bytes, header_row)
}

/// Load an uploaded register held in memory; `file_name` selects the format.
pub fn load_register_bytes(file_name: &str, bytes: Vec<u8>, header_row: usize) -> Result<Dataset> {
    if bytes.is_empty() {
        return Err(AppError::Load(format!("{} is empty", file_name)));
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    let dataset = match extension.as_deref() {
        Some("csv") => {
            let text = String::from_utf8(bytes)
                .map_err(|_| AppError::Load(format!("{} is not UTF-8 text", file_name)))?;
            from_csv_str(file_name, &text, header_row)?
        }
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => {
            from_excel_bytes(file_name, bytes, header_row)?
        }
        Some(ext) => return Err(AppError::UnsupportedFormat(ext.to_string())),
        None => return Err(AppError::UnsupportedFormat("(none)".to_string())),
    };

    log::info!(
        "loaded {}: {} assets, {} columns",
        file_name,
        dataset.len(),
        dataset.columns.len()
    );
    Ok(dataset)
}

/// Read the first worksheet of an Excel/ODS workbook.
///
/// `header_row` is an absolute sheet row, so leading blank rows count.
pub fn from_excel_bytes(file_name: &str, bytes: Vec<u8>, header_row: usize) -> Result<Dataset> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Load(format!("{} has no worksheets", file_name)))??;

    let Some((first_row, _)) = range.start() else {
        return Err(AppError::EmptySheet);
    };
    let first_row = first_row as usize;
    if header_row < first_row || header_row >= first_row + range.height() {
        return Err(AppError::MissingHeader(header_row + 1));
    }

    let mut rows = range.rows().skip(header_row - first_row);
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| cell_value(c).to_string()).collect())
        .unwrap_or_default();
    let data: Vec<Vec<CellValue>> = rows.map(|row| row.iter().map(cell_value).collect()).collect();

    finish(file_name, headers, data, header_row)
}

/// Parse CSV text; the same header-row convention applies.
///
/// Quoted fields may span lines. Blank lines are skipped before the header
/// row is counted.
pub fn from_csv_str(file_name: &str, text: &str, header_row: usize) -> Result<Dataset> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(AppError::EmptySheet);
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = rdr.records().skip(header_row);

    let headers: Vec<String> = match records.next() {
        Some(record) => csv_record(file_name, record)?.iter().map(str::to_string).collect(),
        None => return Err(AppError::MissingHeader(header_row + 1)),
    };

    let mut data: Vec<Vec<CellValue>> = Vec::new();
    for record in records {
        data.push(csv_record(file_name, record)?.iter().map(csv_value).collect());
    }

    finish(file_name, headers, data, header_row)
}

fn csv_record(file_name: &str, record: csv::Result<StringRecord>) -> Result<StringRecord> {
    record.map_err(|e| AppError::Load(format!("{}: {}", file_name, e)))
}

fn finish(
    file_name: &str,
    headers: Vec<String>,
    data: Vec<Vec<CellValue>>,
    header_row: usize,
) -> Result<Dataset> {
    let dataset = Dataset::prepare(file_name, headers, data);
    if dataset.columns.is_empty() {
        return Err(AppError::MissingHeader(header_row + 1));
    }
    if dataset.is_empty() {
        return Err(AppError::EmptySheet);
    }
    Ok(dataset)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => CellValue::Text(format_datetime(dt)),
            None => CellValue::text(cell.to_string()),
        },
        Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::Error(_) | Data::Empty => CellValue::Missing,
    }
}

fn format_datetime(dt: NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn csv_value(field: &str) -> CellValue {
    match field.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::text(field),
    }
}
