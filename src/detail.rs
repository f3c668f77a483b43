use crate::columns::{CanonicalField, ColumnMap, FIELD_GROUPS};
use crate::coordinates::{Coordinates, parse_coordinates};
use crate::dataset::{AssetRecord, Dataset};
use crate::summary::{depreciation_ratio, field_number};
use crate::value::format_amount;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailRow {
    pub label: String,
    pub arabic_label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailGroup {
    pub title: String,
    pub arabic_title: String,
    pub rows: Vec<DetailRow>,
}

/// Everything a renderer needs to lay out one asset's data sheet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetDetail {
    pub asset_id: Option<String>,
    pub title: String,
    pub groups: Vec<DetailGroup>,
    pub coordinates: Option<Coordinates>,
}

impl AssetDetail {
    /// Collect the mapped, non-missing fields of `record` into labeled groups.
    ///
    /// Empty groups are dropped.
    pub fn build(dataset: &Dataset, columns: &ColumnMap, record: &AssetRecord) -> Self {
        let text_of = |field: CanonicalField| -> Option<String> {
            let column = columns.get(field)?;
            let value = dataset.value(record, column);
            (!value.is_missing()).then(|| value.to_string())
        };

        let mut groups = Vec::new();
        for group in FIELD_GROUPS.iter() {
            let mut rows: Vec<DetailRow> = group
                .fields
                .iter()
                .filter_map(|&field| {
                    text_of(field).map(|value| DetailRow {
                        label: field.label().to_string(),
                        arabic_label: field.arabic_label().to_string(),
                        value,
                    })
                })
                .collect();

            if group.fields.contains(&CanonicalField::Cost) {
                let ratio = depreciation_ratio(
                    field_number(dataset, columns, record, CanonicalField::Cost),
                    field_number(dataset, columns, record, CanonicalField::AccumulatedDepreciation),
                );
                if let Some(ratio) = ratio {
                    rows.push(DetailRow {
                        label: "Depreciation %".to_string(),
                        arabic_label: "نسبة الإهلاك".to_string(),
                        value: format!("{}%", format_amount(ratio * 100.0)),
                    });
                }
            }

            if !rows.is_empty() {
                groups.push(DetailGroup {
                    title: group.title.to_string(),
                    arabic_title: group.arabic_title.to_string(),
                    rows,
                });
            }
        }

        let asset_id = text_of(CanonicalField::AssetUniqueNo);
        let title = match (&asset_id, text_of(CanonicalField::Description)) {
            (Some(id), Some(desc)) => format!("{} - {}", id, desc),
            (Some(id), None) => id.clone(),
            (None, Some(desc)) => desc,
            (None, None) => "Asset".to_string(),
        };

        AssetDetail {
            asset_id,
            title,
            groups,
            coordinates: text_of(CanonicalField::Coordinates).and_then(|t| parse_coordinates(&t)),
        }
    }

    pub fn field_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }
}

/// Details for each index in `rows`, skipping out-of-range indices.
pub fn build_details(dataset: &Dataset, columns: &ColumnMap, rows: &[usize]) -> Vec<AssetDetail> {
    rows.iter()
        .filter_map(|&i| dataset.records.get(i))
        .map(|r| AssetDetail::build(dataset, columns, r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::resolve_columns;
    use crate::value::CellValue;

    #[test]
    fn missing_and_unmapped_fields_are_omitted() {
        let ds = Dataset::prepare(
            "t",
            vec![
                "Unique Asset Number".into(),
                "Asset Description".into(),
                "Manufacturer".into(),
                "Cost".into(),
                "Accumulated Depreciation".into(),
                "Geographical Coordinates".into(),
            ],
            vec![vec![
                CellValue::text("A-9"),
                CellValue::text("Chiller"),
                CellValue::Missing,
                CellValue::Number(4000.0),
                CellValue::Number(1000.0),
                CellValue::text("24.7,46.6"),
            ]],
        );
        let map = resolve_columns(&ds.columns);
        let detail = AssetDetail::build(&ds, &map, &ds.records[0]);

        assert_eq!(detail.asset_id.as_deref(), Some("A-9"));
        assert_eq!(detail.title, "A-9 - Chiller");
        let titles: Vec<&str> = detail.groups.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Identification", "Specifications", "Financial values", "Location"]);

        let spec_labels: Vec<&str> = detail.groups[1].rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(spec_labels, vec!["Description"]);

        let financial = &detail.groups[2].rows;
        assert_eq!(financial.last().map(|r| r.value.as_str()), Some("25.00%"));
        assert_eq!(detail.coordinates, Some(Coordinates { lat: 24.7, lon: 46.6 }));
    }

    #[test]
    fn malformed_coordinates_mean_no_location() {
        let ds = Dataset::prepare(
            "t",
            vec!["الإحداثيات".into()],
            vec![vec![CellValue::text("somewhere north")]],
        );
        let map = resolve_columns(&ds.columns);
        let detail = AssetDetail::build(&ds, &map, &ds.records[0]);
        assert_eq!(detail.coordinates, None);
        assert_eq!(detail.title, "Asset");
        assert_eq!(detail.field_count(), 1);
    }
}
