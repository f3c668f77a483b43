use crate::columns::{CanonicalField, ColumnMap};
use crate::dataset::Dataset;
use crate::summary::{field_number, group_by, summarize, top_by_cost};
use crate::value::format_amount;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

const DEFAULT_TOP: usize = 5;
const MAX_TOP: usize = 20;

lazy_static! {
    // Identifier-like tokens: must contain a digit.
    static ref ID_TOKEN: Regex = Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}_\-/.]*").unwrap();
    static ref TOP_N: Regex = Regex::new(r"\b(\d{1,2})\b").unwrap();

    // English keywords must be whole words ("top" is not in "laptop");
    // Arabic ones may carry attached prefixes.
    static ref MOST_EXPENSIVE: Regex =
        Regex::new(r"\b(?:most expensive|highest cost|top)\b|أغلى|الأعلى تكلفة|اعلى تكلفة").unwrap();
    static ref BY_CITY: Regex = Regex::new(r"\b(?:by city|per city|cities)\b|حسب المدينة|المدن|لكل مدينة").unwrap();
    static ref DEPRECIATION: Regex = Regex::new(r"\bdepreciation\b|الإهلاك|الاهلاك|الاستهلاك").unwrap();
    static ref NET_BOOK_VALUE: Regex = Regex::new(r"\b(?:net book|book value|nbv)\b|القيمة الدفترية").unwrap();
    static ref COST: Regex = Regex::new(r"\bcosts?\b|التكلفة|تكلفة").unwrap();
    static ref COUNT: Regex = Regex::new(r"\b(?:how many|count|number of assets)\b|كم عدد|عدد").unwrap();
}

/// What a question was understood to ask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Count,
    TotalCost,
    TotalNetBookValue,
    TotalDepreciation,
    MostExpensive,
    ByCity,
    Lookup,
    Help,
}

/// A reply plus the records it refers to.
#[derive(Clone, Debug, Serialize)]
pub struct Answer {
    pub intent: Intent,
    pub text: String,
    pub rows: Vec<usize>,
}

/// Answer a free-text question about the `rows` of `dataset`
///
/// Questions are matched against fixed English and Arabic keyword lists.
/// An identifier that names an existing asset is looked up across the whole
/// register; everything else works on `rows`. Anything not understood gets
/// the help text.
///
/// # Examples
/// ```
/// use asset_register::assistant::{answer, Intent};
/// use asset_register::columns::resolve_columns;
/// use asset_register::dataset::Dataset;
/// use asset_register::value::CellValue;
///
/// let ds = Dataset::prepare("r", vec!["Cost".into()], vec![vec![CellValue::Number(5.0)]]);
/// let cols = resolve_columns(&ds.columns);
/// assert_eq!(answer("how many assets?", &ds, &cols, &[0]).intent, Intent::Count);
/// ```
pub fn answer(question: &str, dataset: &Dataset, columns: &ColumnMap, rows: &[usize]) -> Answer {
    let q = question.trim().to_lowercase();

    let answer = if q.is_empty() {
        help()
    } else if MOST_EXPENSIVE.is_match(&q) {
        most_expensive(&q, dataset, columns, rows)
    } else if BY_CITY.is_match(&q) {
        by_city(dataset, columns, rows)
    } else if let Some(index) = lookup_id(question, dataset, columns) {
        lookup(index, dataset, columns)
    } else if DEPRECIATION.is_match(&q) {
        total(Intent::TotalDepreciation, dataset, columns, rows)
    } else if NET_BOOK_VALUE.is_match(&q) {
        total(Intent::TotalNetBookValue, dataset, columns, rows)
    } else if COST.is_match(&q) {
        total(Intent::TotalCost, dataset, columns, rows)
    } else if COUNT.is_match(&q) {
        Answer {
            intent: Intent::Count,
            text: format!("Assets: {} / عدد الأصول: {}", rows.len(), rows.len()),
            rows: Vec::new(),
        }
    } else {
        help()
    };

    log::debug!("assistant: {:?} for {:?}", answer.intent, question);
    answer
}

fn help() -> Answer {
    Answer {
        intent: Intent::Help,
        text: "Try: how many assets? · total cost · net book value · depreciation · \
               most expensive 5 · by city · an asset number. \
               جرّب: كم عدد الأصول؟ · التكلفة · القيمة الدفترية · الإهلاك · أغلى الأصول · حسب المدينة · رقم أصل."
            .to_string(),
        rows: Vec::new(),
    }
}

fn not_mapped(intent: Intent, field: CanonicalField) -> Answer {
    Answer {
        intent,
        text: format!(
            "The register has no {} column / لا يوجد عمود {}",
            field.label(),
            field.arabic_label()
        ),
        rows: Vec::new(),
    }
}

fn total(intent: Intent, dataset: &Dataset, columns: &ColumnMap, rows: &[usize]) -> Answer {
    let summary = summarize(dataset, columns, rows);
    let (field, amount) = match intent {
        Intent::TotalDepreciation => (CanonicalField::AccumulatedDepreciation, summary.total_accumulated_depreciation),
        Intent::TotalNetBookValue => (CanonicalField::NetBookValue, summary.total_net_book_value),
        _ => (CanonicalField::Cost, summary.total_cost),
    };
    if columns.get(field).is_none() {
        return not_mapped(intent, field);
    }

    let mut text = format!(
        "{}: {} / {}: {}",
        field.label(),
        format_amount(amount),
        field.arabic_label(),
        format_amount(amount)
    );
    if let (Intent::TotalDepreciation, Some(ratio)) = (intent, summary.depreciation_ratio) {
        text.push_str(&format!(" ({:.1}% of cost)", ratio * 100.0));
    }
    Answer {
        intent,
        text,
        rows: Vec::new(),
    }
}

fn most_expensive(q: &str, dataset: &Dataset, columns: &ColumnMap, rows: &[usize]) -> Answer {
    if columns.get(CanonicalField::Cost).is_none() {
        return not_mapped(Intent::MostExpensive, CanonicalField::Cost);
    }
    let n = TOP_N
        .captures(q)
        .and_then(|c| c[1].parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_TOP)
        .min(MAX_TOP);

    let top = top_by_cost(dataset, columns, rows, n);
    let id_col = columns.get(CanonicalField::AssetUniqueNo);
    let desc_col = columns.get(CanonicalField::Description);
    let lines: Vec<String> = top
        .iter()
        .filter_map(|&i| dataset.records.get(i).map(|r| (i, r)))
        .map(|(i, record)| {
            let cost = field_number(dataset, columns, record, CanonicalField::Cost).unwrap_or(0.0);
            let id = dataset.text(record, id_col);
            let label = if id.is_empty() { format!("#{}", i + 1) } else { id };
            let desc = dataset.text(record, desc_col);
            if desc.is_empty() {
                format!("{}: {}", label, format_amount(cost))
            } else {
                format!("{} ({}): {}", label, desc, format_amount(cost))
            }
        })
        .collect();

    let text = if lines.is_empty() {
        "No asset has a cost / لا توجد أصول بتكلفة".to_string()
    } else {
        format!("Most expensive / الأعلى تكلفة: {}", lines.join("; "))
    };
    Answer {
        intent: Intent::MostExpensive,
        text,
        rows: top,
    }
}

fn by_city(dataset: &Dataset, columns: &ColumnMap, rows: &[usize]) -> Answer {
    if columns.get(CanonicalField::City).is_none() {
        return not_mapped(Intent::ByCity, CanonicalField::City);
    }
    let parts: Vec<String> = group_by(dataset, columns, rows, CanonicalField::City)
        .iter()
        .map(|g| format!("{}: {}", g.key, g.count))
        .collect();
    Answer {
        intent: Intent::ByCity,
        text: format!("Assets by city / حسب المدينة: {}", parts.join(", ")),
        rows: Vec::new(),
    }
}

/// First identifier-like token naming an asset, by unique number then tag.
fn lookup_id(question: &str, dataset: &Dataset, columns: &ColumnMap) -> Option<usize> {
    let id_columns: Vec<&str> = [CanonicalField::AssetUniqueNo, CanonicalField::TagNumber]
        .iter()
        .filter_map(|f| columns.get(*f))
        .collect();

    ID_TOKEN
        .find_iter(question)
        .map(|m| m.as_str().trim_end_matches(['.', '/', '-']))
        .filter(|token| token.chars().any(|c| c.is_numeric()))
        .find_map(|token| id_columns.iter().find_map(|col| dataset.find_by_id(col, token)))
}

fn lookup(index: usize, dataset: &Dataset, columns: &ColumnMap) -> Answer {
    let Some(record) = dataset.records.get(index) else {
        return help();
    };
    let mut parts = Vec::new();
    for field in [
        CanonicalField::AssetUniqueNo,
        CanonicalField::Description,
        CanonicalField::City,
        CanonicalField::Cost,
        CanonicalField::NetBookValue,
    ] {
        let value = dataset.text(record, columns.get(field));
        if !value.is_empty() {
            parts.push(format!("{}: {}", field.label(), value));
        }
    }
    Answer {
        intent: Intent::Lookup,
        text: parts.join(" · "),
        rows: vec![index],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::resolve_columns;
    use crate::value::CellValue;

    fn register() -> (Dataset, ColumnMap) {
        let ds = Dataset::prepare(
            "r",
            vec![
                "Unique Asset Number".into(),
                "Asset Description".into(),
                "City".into(),
                "Cost".into(),
                "Accumulated Depreciation".into(),
            ],
            vec![
                vec![
                    CellValue::text("A-100"),
                    CellValue::text("Pump"),
                    CellValue::text("Riyadh"),
                    CellValue::Number(1000.0),
                    CellValue::Number(400.0),
                ],
                vec![
                    CellValue::text("A-200"),
                    CellValue::text("Desk"),
                    CellValue::text("Jeddah"),
                    CellValue::Number(50.0),
                    CellValue::Number(10.0),
                ],
                vec![
                    CellValue::text("A-300"),
                    CellValue::text("Truck"),
                    CellValue::text("Riyadh"),
                    CellValue::Number(9000.0),
                    CellValue::Missing,
                ],
            ],
        );
        let cols = resolve_columns(&ds.columns);
        (ds, cols)
    }

    #[test]
    fn counts_in_english_and_arabic() {
        let (ds, cols) = register();
        let a = answer("How many assets are there?", &ds, &cols, &[0, 1, 2]);
        assert_eq!(a.intent, Intent::Count);
        assert!(a.text.contains('3'));
        assert_eq!(answer("كم عدد الأصول", &ds, &cols, &[0]).intent, Intent::Count);
    }

    #[test]
    fn keywords_inside_other_words_do_not_match() {
        let (ds, cols) = register();
        assert_eq!(answer("how many laptops?", &ds, &cols, &[0, 1]).intent, Intent::Count);
        assert_eq!(answer("count the desktops", &ds, &cols, &[0]).intent, Intent::Count);
        assert_eq!(answer("accounting", &ds, &cols, &[0]).intent, Intent::Help);
        assert_eq!(answer("what does it cost?", &ds, &cols, &[0]).intent, Intent::TotalCost);
    }

    #[test]
    fn totals_use_the_selection() {
        let (ds, cols) = register();
        let a = answer("total cost", &ds, &cols, &[0, 1]);
        assert_eq!(a.intent, Intent::TotalCost);
        assert!(a.text.contains("1,050.00"));

        let d = answer("إجمالي الإهلاك", &ds, &cols, &[0, 1]);
        assert_eq!(d.intent, Intent::TotalDepreciation);
        assert!(d.text.contains("410.00"));
    }

    #[test]
    fn unmapped_field_is_reported() {
        let (ds, cols) = register();
        let a = answer("net book value?", &ds, &cols, &[0]);
        assert_eq!(a.intent, Intent::TotalNetBookValue);
        assert!(a.text.contains("no Net Book Value column"));
    }

    #[test]
    fn most_expensive_honours_requested_count() {
        let (ds, cols) = register();
        let a = answer("top 2 most expensive", &ds, &cols, &[0, 1, 2]);
        assert_eq!(a.intent, Intent::MostExpensive);
        assert_eq!(a.rows, vec![2, 0]);
        assert!(a.text.starts_with("Most expensive"));
    }

    #[test]
    fn breakdown_by_city() {
        let (ds, cols) = register();
        let a = answer("assets by city", &ds, &cols, &[0, 1, 2]);
        assert_eq!(a.intent, Intent::ByCity);
        assert!(a.text.contains("Riyadh: 2"));
        assert!(a.text.contains("Jeddah: 1"));
    }

    #[test]
    fn identifiers_are_looked_up() {
        let (ds, cols) = register();
        let a = answer("what is the cost of A-200?", &ds, &cols, &[0]);
        assert_eq!(a.intent, Intent::Lookup);
        assert_eq!(a.rows, vec![1]);
        assert!(a.text.contains("Desk"));
    }

    #[test]
    fn unknown_questions_get_help() {
        let (ds, cols) = register();
        assert_eq!(answer("hello there", &ds, &cols, &[0]).intent, Intent::Help);
        assert_eq!(answer("   ", &ds, &cols, &[0]).intent, Intent::Help);
        // An identifier that names no asset falls through.
        assert_eq!(answer("Z-999", &ds, &cols, &[0]).intent, Intent::Help);
    }
}
