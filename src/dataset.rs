use crate::value::CellValue;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// One row of the uploaded register, aligned with [`Dataset::columns`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AssetRecord {
    pub values: Vec<CellValue>,
}

impl AssetRecord {
    pub fn new(values: Vec<CellValue>) -> Self {
        AssetRecord { values }
    }

    pub fn get(&self, index: usize) -> &CellValue {
        const MISSING: &CellValue = &CellValue::Missing;
        self.values.get(index).unwrap_or(MISSING)
    }
}

/// A parsed asset register. Lives for one session and is never written back.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Dataset {
    pub source_name: String,
    pub columns: Vec<String>,
    pub records: Vec<AssetRecord>,
}

// Suffix `.1`, `.2`, ... until the name is unused; every emitted name counts
// as taken, so a later literal `A.1` becomes `A.1.1`.
fn unique_name(seen: &mut HashMap<String, usize>, header: String) -> String {
    let mut name = header;
    let mut count = seen.get(&name).copied().unwrap_or(0);
    while count > 0 {
        seen.insert(name.clone(), count + 1);
        name = format!("{}.{}", name, count);
        count = seen.get(&name).copied().unwrap_or(0);
    }
    seen.insert(name.clone(), 1);
    name
}

/// Trim a header and collapse internal whitespace runs to one space.
///
/// Case is preserved; see [`crate::columns::normalize_header`] for the
/// comparison form.
pub fn clean_header(raw: &str) -> String {
    WHITESPACE_RUN.replace_all(raw.trim(), " ").into_owned()
}

fn is_placeholder_header(header: &str) -> bool {
    header.is_empty() || header.starts_with("Unnamed")
}

impl Dataset {
    /// Build a dataset from a raw header row and raw data rows.
    ///
    /// Columns with a blank or `Unnamed…` header are dropped, headers are
    /// cleaned, repeated headers get `.1`, `.2` suffixes and rows that are
    /// entirely missing are skipped.
    pub fn prepare(
        source_name: impl Into<String>,
        raw_headers: Vec<String>,
        raw_rows: Vec<Vec<CellValue>>,
    ) -> Self {
        let mut keep = Vec::new();
        let mut columns = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (i, raw) in raw_headers.iter().enumerate() {
            let header = clean_header(raw);
            if is_placeholder_header(&header) {
                continue;
            }
            let name = unique_name(&mut seen, header);
            keep.push(i);
            columns.push(name);
        }

        let records = raw_rows
            .into_iter()
            .map(|mut row| {
                let values = keep
                    .iter()
                    .map(|&i| row.get_mut(i).map(std::mem::take).unwrap_or_default())
                    .collect::<Vec<_>>();
                AssetRecord::new(values)
            })
            .filter(|record| record.values.iter().any(|v| !v.is_missing()))
            .collect();

        Dataset {
            source_name: source_name.into(),
            columns,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// The value of `column` in `record`, or missing when the column is absent.
    pub fn value<'a>(&self, record: &'a AssetRecord, column: &str) -> &'a CellValue {
        const MISSING: &CellValue = &CellValue::Missing;
        match self.column_index(column) {
            Some(i) => record.get(i),
            None => MISSING,
        }
    }

    /// Display text of `column` in `record`; empty when absent or missing.
    pub fn text(&self, record: &AssetRecord, column: Option<&str>) -> String {
        column
            .map(|c| self.value(record, c).to_string())
            .unwrap_or_default()
    }

    /// Index of the first record whose `id_column` reads exactly `id`.
    pub fn find_by_id(&self, id_column: &str, id: &str) -> Option<usize> {
        let col = self.column_index(id_column)?;
        let id = id.trim();
        self.records
            .iter()
            .position(|r| !r.get(col).is_missing() && r.get(col).to_string() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> CellValue {
        CellValue::text(s)
    }

    #[test]
    fn drops_placeholder_columns_and_cleans_headers() {
        let ds = Dataset::prepare(
            "x.xlsx",
            vec![
                "  Asset   Description ".into(),
                "Unnamed: 1".into(),
                "".into(),
                "Cost".into(),
            ],
            vec![vec![t("Pump"), t("junk"), t("junk"), CellValue::Number(10.0)]],
        );
        assert_eq!(ds.columns, vec!["Asset Description", "Cost"]);
        assert_eq!(ds.records[0].values, vec![t("Pump"), CellValue::Number(10.0)]);
    }

    #[test]
    fn repeated_headers_are_suffixed() {
        let ds = Dataset::prepare(
            "x",
            vec!["City".into(), "City".into(), "City".into()],
            vec![],
        );
        assert_eq!(ds.columns, vec!["City", "City.1", "City.2"]);
    }

    #[test]
    fn suffixes_skip_names_already_taken() {
        let ds = Dataset::prepare("x", vec!["A".into(), "A".into(), "A.1".into()], vec![]);
        assert_eq!(ds.columns, vec!["A", "A.1", "A.1.1"]);
        assert_eq!(ds.column_index("A.1.1"), Some(2));

        let ds = Dataset::prepare("x", vec!["A.1".into(), "A".into(), "A".into()], vec![]);
        assert_eq!(ds.columns, vec!["A.1", "A", "A.1.1"]);
    }

    #[test]
    fn blank_rows_are_skipped_and_short_rows_padded() {
        let ds = Dataset::prepare(
            "x",
            vec!["A".into(), "B".into()],
            vec![
                vec![CellValue::Missing, CellValue::Missing],
                vec![t("only a")],
            ],
        );
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records[0].values, vec![t("only a"), CellValue::Missing]);
    }

    #[test]
    fn find_by_id_matches_display_text() {
        let ds = Dataset::prepare(
            "x",
            vec!["ID".into()],
            vec![vec![CellValue::Number(1001.0)], vec![t("A-7")]],
        );
        assert_eq!(ds.find_by_id("ID", "1001"), Some(0));
        assert_eq!(ds.find_by_id("ID", "A-7"), Some(1));
        assert_eq!(ds.find_by_id("ID", "nope"), None);
        assert_eq!(ds.find_by_id("Other", "1001"), None);
    }
}
