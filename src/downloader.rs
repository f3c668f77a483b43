use crate::dataset::Dataset;
use crate::detail::AssetDetail;
use crate::error::{AppError, Result};
use crate::value::CellValue;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};
use std::collections::HashSet;

const MAX_COLUMN_WIDTH: usize = 50;

/// Convert the selected rows to CSV
///
/// The header row carries the dataset's column names. Fields containing
/// commas, quotes or newlines are quoted, with quotes doubled.
///
/// # Arguments
/// * `dataset` - Source register
/// * `rows` - Record indices to export, in output order
///
/// # Examples
/// ```
/// use asset_register::dataset::Dataset;
/// use asset_register::downloader::table_to_csv;
/// use asset_register::value::CellValue;
///
/// let ds = Dataset::prepare("r", vec!["ID".into()], vec![vec![CellValue::text("A,1")]]);
/// assert_eq!(table_to_csv(&ds, &[0]).unwrap(), "ID\n\"A,1\"\n");
/// ```
pub fn table_to_csv(dataset: &Dataset, rows: &[usize]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&dataset.columns).map_err(csv_error)?;

    for record in rows.iter().filter_map(|&i| dataset.records.get(i)) {
        writer
            .write_record(record.values.iter().map(|v| v.to_string()))
            .map_err(csv_error)?;
    }

    let bytes = writer.into_inner().map_err(|e| AppError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Export(e.to_string()))
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Export(format!("csv: {}", e))
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xD9E1F2))
        .set_border(FormatBorder::Thin)
}

/// Convert the selected rows to an XLSX workbook
///
/// Numbers stay numeric so the exported sheet can be summed in Excel. The
/// header row is frozen and carries an autofilter.
///
/// # Returns
/// * XLSX file content as bytes, or an export error
pub fn table_to_xlsx(dataset: &Dataset, rows: &[usize]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = header_format();
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Assets")?;

        let mut widths: Vec<usize> = dataset.columns.iter().map(|c| c.chars().count()).collect();
        for (c, name) in dataset.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, c as u16, name, &header)?;
        }

        let mut out_row = 0u32;
        for record in rows.iter().filter_map(|&i| dataset.records.get(i)) {
            out_row += 1;
            for (c, value) in record.values.iter().enumerate() {
                match value {
                    CellValue::Number(n) if n.is_finite() => {
                        worksheet.write_number(out_row, c as u16, *n)?;
                    }
                    CellValue::Text(s) => {
                        worksheet.write_string(out_row, c as u16, s)?;
                    }
                    _ => {}
                }
                if let Some(w) = widths.get_mut(c) {
                    *w = (*w).max(value.to_string().chars().count());
                }
            }
        }

        for (c, w) in widths.iter().enumerate() {
            worksheet.set_column_width(c as u16, (*w).clamp(8, MAX_COLUMN_WIDTH) as f64 + 2.0)?;
        }
        if !dataset.columns.is_empty() {
            worksheet.set_freeze_panes(1, 0)?;
            worksheet.autofilter(0, 0, out_row, dataset.columns.len() as u16 - 1)?;
        }
    }

    let buffer = workbook.save_to_buffer()?;
    log::info!("exported {} rows to xlsx ({} bytes)", rows.len(), buffer.len());
    Ok(buffer)
}

/// Excel-safe worksheet name, unique within `used`.
fn sheet_name(wanted: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = wanted
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    let base: String = if cleaned.is_empty() { "Asset".to_string() } else { cleaned.chars().take(31).collect() };

    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({})", n);
        let keep = 31 - suffix.chars().count();
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}

/// Write asset data sheets, one worksheet per asset
///
/// Each sheet lists the asset's field groups as Arabic label, English label
/// and value, laid out right-to-left.
pub fn details_to_xlsx(details: &[AssetDetail]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let title_format = Format::new().set_bold().set_font_size(14);
    let group_format = header_format();
    let value_format = Format::new().set_text_wrap();
    let mut used = HashSet::new();

    if details.is_empty() {
        workbook.add_worksheet().set_name("Assets")?;
    }

    for (i, detail) in details.iter().enumerate() {
        let fallback = format!("Asset {}", i + 1);
        let name = sheet_name(detail.asset_id.as_deref().unwrap_or(&fallback), &mut used);

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;
        worksheet.set_right_to_left(true);
        worksheet.set_column_width(0, 28)?;
        worksheet.set_column_width(1, 28)?;
        worksheet.set_column_width(2, 45)?;
        worksheet.write_string_with_format(0, 0, &detail.title, &title_format)?;

        let mut row = 2u32;
        for group in &detail.groups {
            worksheet.write_string_with_format(row, 0, &group.arabic_title, &group_format)?;
            worksheet.write_string_with_format(row, 1, &group.title, &group_format)?;
            worksheet.write_string_with_format(row, 2, "", &group_format)?;
            row += 1;
            for field in &group.rows {
                worksheet.write_string(row, 0, &field.arabic_label)?;
                worksheet.write_string(row, 1, &field.label)?;
                worksheet.write_string_with_format(row, 2, &field.value, &value_format)?;
                row += 1;
            }
            row += 1;
        }
    }

    let buffer = workbook.save_to_buffer()?;
    log::info!("exported {} asset sheets to xlsx ({} bytes)", details.len(), buffer.len());
    Ok(buffer)
}
