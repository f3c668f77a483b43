use crate::columns::{CanonicalField, ColumnMap};
use crate::dataset::{AssetRecord, Dataset};
use crate::value::coerce_number;
use serde::Serialize;
use std::collections::HashMap;

pub const BLANK_GROUP: &str = "(blank)";

/// Financial totals over a selection of records.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub total_cost: f64,
    pub total_accumulated_depreciation: f64,
    pub total_residual_value: f64,
    pub total_net_book_value: f64,
    /// Accumulated depreciation over cost, when cost is positive.
    pub depreciation_ratio: Option<f64>,
}

/// Per-group count and totals.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub count: usize,
    pub total_cost: f64,
    pub total_net_book_value: f64,
}

/// Numeric value of `field` in `record`; `None` when unmapped or not a number.
pub fn field_number(
    dataset: &Dataset,
    columns: &ColumnMap,
    record: &AssetRecord,
    field: CanonicalField,
) -> Option<f64> {
    let column = columns.get(field)?;
    coerce_number(dataset.value(record, column))
}

/// Depreciated share of cost; `None` unless both figures exist and cost > 0.
pub fn depreciation_ratio(cost: Option<f64>, accumulated: Option<f64>) -> Option<f64> {
    match (cost, accumulated) {
        (Some(cost), Some(acc)) if cost > 0.0 => Some(acc / cost),
        _ => None,
    }
}

pub fn summarize(dataset: &Dataset, columns: &ColumnMap, rows: &[usize]) -> Summary {
    let sum = |field: CanonicalField| -> f64 {
        rows.iter()
            .filter_map(|&i| dataset.records.get(i))
            .filter_map(|r| field_number(dataset, columns, r, field))
            .sum()
    };

    let total_cost = sum(CanonicalField::Cost);
    let total_accumulated_depreciation = sum(CanonicalField::AccumulatedDepreciation);
    let has_cost = columns.get(CanonicalField::Cost).is_some();
    let has_acc = columns.get(CanonicalField::AccumulatedDepreciation).is_some();

    Summary {
        count: rows.len(),
        total_cost,
        total_accumulated_depreciation,
        total_residual_value: sum(CanonicalField::ResidualValue),
        total_net_book_value: sum(CanonicalField::NetBookValue),
        depreciation_ratio: depreciation_ratio(
            has_cost.then_some(total_cost),
            has_acc.then_some(total_accumulated_depreciation),
        ),
    }
}

/// Group the selection by the display value of `field`.
///
/// Sorted by count (descending), then key. Returns an empty list when the
/// field is unmapped.
pub fn group_by(
    dataset: &Dataset,
    columns: &ColumnMap,
    rows: &[usize],
    field: CanonicalField,
) -> Vec<GroupTotal> {
    let Some(column) = columns.get(field) else {
        return Vec::new();
    };

    let mut groups: HashMap<String, GroupTotal> = HashMap::new();
    for record in rows.iter().filter_map(|&i| dataset.records.get(i)) {
        let value = dataset.value(record, column);
        let key = if value.is_missing() {
            BLANK_GROUP.to_string()
        } else {
            value.to_string()
        };
        let entry = groups.entry(key.clone()).or_insert_with(|| GroupTotal {
            key,
            count: 0,
            total_cost: 0.0,
            total_net_book_value: 0.0,
        });
        entry.count += 1;
        entry.total_cost += field_number(dataset, columns, record, CanonicalField::Cost).unwrap_or(0.0);
        entry.total_net_book_value +=
            field_number(dataset, columns, record, CanonicalField::NetBookValue).unwrap_or(0.0);
    }

    let mut groups: Vec<GroupTotal> = groups.into_values().collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    groups
}

/// The `n` records with the highest cost, most expensive first.
pub fn top_by_cost(dataset: &Dataset, columns: &ColumnMap, rows: &[usize], n: usize) -> Vec<usize> {
    let mut priced: Vec<(usize, f64)> = rows
        .iter()
        .filter_map(|&i| {
            let record = dataset.records.get(i)?;
            field_number(dataset, columns, record, CanonicalField::Cost).map(|c| (i, c))
        })
        .collect();
    priced.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    priced.into_iter().take(n).map(|(i, _)| i).collect()
}
