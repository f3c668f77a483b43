use crate::columns::{CanonicalField, ColumnMap};
use crate::dataset::{AssetRecord, Dataset};
use serde::Serialize;
use std::collections::BTreeSet;

/// Fields the free-text search looks at, in concatenation order.
pub const SEARCH_FIELDS: [CanonicalField; 3] = [
    CanonicalField::AssetUniqueNo,
    CanonicalField::TagNumber,
    CanonicalField::Description,
];

/// Search text plus exact-match filters on canonical fields.
#[derive(Clone, Debug, Default)]
pub struct RowFilter {
    pub search: String,
    pub equals: Vec<(CanonicalField, String)>,
}

impl RowFilter {
    pub fn search(search: impl Into<String>) -> Self {
        RowFilter {
            search: search.into(),
            equals: Vec::new(),
        }
    }

    /// Add an equality filter; blank values are ignored.
    pub fn with_equals(mut self, field: CanonicalField, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.equals.push((field, value));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty() && self.equals.is_empty()
    }

    /// Indices of matching records, in dataset order.
    ///
    /// A filter on a field that has no mapped column is skipped.
    pub fn apply(&self, dataset: &Dataset, columns: &ColumnMap) -> Vec<usize> {
        let needle = self.search.trim().to_lowercase();
        let search_cols: Vec<Option<&str>> = SEARCH_FIELDS.iter().map(|f| columns.get(*f)).collect();
        let equals: Vec<(&str, &str)> = self
            .equals
            .iter()
            .filter_map(|(field, value)| {
                let col = columns.get(*field).filter(|c| dataset.has_column(c));
                col.map(|c| (c, value.as_str()))
            })
            .collect();

        dataset
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                needle.is_empty() || search_text(dataset, record, &search_cols).contains(&needle)
            })
            .filter(|(_, record)| {
                equals
                    .iter()
                    .all(|(col, value)| dataset.value(record, col).to_string() == *value)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

fn search_text(dataset: &Dataset, record: &AssetRecord, cols: &[Option<&str>]) -> String {
    cols.iter()
        .map(|c| dataset.text(record, *c))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Sorted unique non-empty display values of `column`.
pub fn distinct_values(dataset: &Dataset, column: &str) -> Vec<String> {
    let Some(index) = dataset.column_index(column) else {
        return Vec::new();
    };
    dataset
        .records
        .iter()
        .filter(|r| !r.get(index).is_missing())
        .map(|r| r.get(index).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One page of a result set. Page numbers are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    pub number: usize,
    pub size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
}

impl Page {
    /// Clamp `requested` into the valid range for `total_rows`.
    pub fn new(total_rows: usize, requested: usize, size: usize) -> Self {
        let size = size.max(1);
        let total_pages = total_rows.div_ceil(size).max(1);
        let number = requested.clamp(1, total_pages);
        let start = ((number - 1) * size).min(total_rows);
        let end = (start + size).min(total_rows);
        Page {
            number,
            size,
            total_rows,
            total_pages,
            start,
            end,
        }
    }

    pub fn has_prev(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.start.min(items.len())..self.end.min(items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::resolve_columns;
    use crate::value::CellValue;

    fn register() -> Dataset {
        let t = |s: &str| CellValue::text(s);
        Dataset::prepare(
            "test.xlsx",
            vec![
                "Unique Asset Number".into(),
                "Tag number".into(),
                "Asset Description".into(),
                "City".into(),
            ],
            vec![
                vec![t("A-1"), t("T-100"), t("Water Pump"), t("Riyadh")],
                vec![t("A-2"), t("T-200"), t("Office Desk"), t("Jeddah")],
                vec![t("A-3"), t("T-300"), t("Air Conditioner"), t("Riyadh")],
                vec![CellValue::Number(4.0), t("T-400"), t("Generator"), CellValue::Missing],
            ],
        )
    }

    #[test]
    fn absent_substring_yields_nothing() {
        let ds = register();
        let map = resolve_columns(&ds.columns);
        assert!(RowFilter::search("forklift").apply(&ds, &map).is_empty());
    }

    #[test]
    fn unique_description_substring_yields_that_row() {
        let ds = register();
        let map = resolve_columns(&ds.columns);
        assert_eq!(RowFilter::search("desk").apply(&ds, &map), vec![1]);
        assert_eq!(RowFilter::search("  AIR cond ").apply(&ds, &map), vec![2]);
    }

    #[test]
    fn search_spans_id_and_tag() {
        let ds = register();
        let map = resolve_columns(&ds.columns);
        assert_eq!(RowFilter::search("t-3").apply(&ds, &map), vec![2]);
        assert_eq!(RowFilter::search("4 t-400").apply(&ds, &map), vec![3]);
        assert_eq!(RowFilter::search("").apply(&ds, &map).len(), 4);
    }

    #[test]
    fn equality_filters_combine_with_search() {
        let ds = register();
        let map = resolve_columns(&ds.columns);
        let f = RowFilter::search("").with_equals(CanonicalField::City, "Riyadh");
        assert_eq!(f.apply(&ds, &map), vec![0, 2]);
        let f = RowFilter::search("pump").with_equals(CanonicalField::City, "Riyadh");
        assert_eq!(f.apply(&ds, &map), vec![0]);
        // Unmapped field: ignored.
        let f = RowFilter::default().with_equals(CanonicalField::Region, "Central");
        assert_eq!(f.apply(&ds, &map).len(), 4);
    }

    #[test]
    fn distinct_values_are_sorted_and_skip_missing() {
        let ds = register();
        assert_eq!(distinct_values(&ds, "City"), vec!["Jeddah", "Riyadh"]);
        assert!(distinct_values(&ds, "Nope").is_empty());
    }

    #[test]
    fn pages_clamp_and_slice() {
        let p = Page::new(45, 3, 20);
        assert_eq!((p.number, p.total_pages, p.start, p.end), (3, 3, 40, 45));
        assert!(p.has_prev() && !p.has_next());

        let p = Page::new(45, 99, 20);
        assert_eq!(p.number, 3);
        let p = Page::new(0, 0, 20);
        assert_eq!((p.number, p.total_pages, p.start, p.end), (1, 1, 0, 0));

        let items: Vec<usize> = (0..45).collect();
        assert_eq!(Page::new(45, 2, 20).slice(&items), &items[20..40]);
    }
}
