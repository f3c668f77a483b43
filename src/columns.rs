//! Canonical asset fields and resolution of raw spreadsheet headers onto them.

use crate::dataset::{Dataset, clean_header};
use crate::error::{AppError, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A semantic field the application knows how to display or compute with.
///
/// Variant order is the resolution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    AssetUniqueNo,
    Description,
    TagNumber,
    UnitOfMeasure,
    Quantity,
    Manufacturer,
    DatePlacedInService,
    Cost,
    DepreciationExpense,
    AccumulatedDepreciation,
    ResidualValue,
    NetBookValue,
    UsefulLife,
    RemainingLife,
    Country,
    Region,
    City,
    Coordinates,
    Building,
    Floor,
    RoomOffice,
    EntityName,
    EntityCode,
    AccountingGroupCode,
    AccountingGroupDesc,
}

use CanonicalField::*;

impl CanonicalField {
    pub const ALL: [CanonicalField; 25] = [
        AssetUniqueNo,
        Description,
        TagNumber,
        UnitOfMeasure,
        Quantity,
        Manufacturer,
        DatePlacedInService,
        Cost,
        DepreciationExpense,
        AccumulatedDepreciation,
        ResidualValue,
        NetBookValue,
        UsefulLife,
        RemainingLife,
        Country,
        Region,
        City,
        Coordinates,
        Building,
        Floor,
        RoomOffice,
        EntityName,
        EntityCode,
        AccountingGroupCode,
        AccountingGroupDesc,
    ];

    /// English name, also used as the stable key in URLs and JSON.
    pub fn label(self) -> &'static str {
        match self {
            AssetUniqueNo => "Asset Unique No",
            Description => "Description",
            TagNumber => "Tag Number",
            UnitOfMeasure => "Unit of Measure",
            Quantity => "Quantity",
            Manufacturer => "Manufacturer",
            DatePlacedInService => "Date Placed in Service",
            Cost => "Cost",
            DepreciationExpense => "Depreciation Expense",
            AccumulatedDepreciation => "Accumulated Depreciation",
            ResidualValue => "Residual Value",
            NetBookValue => "Net Book Value",
            UsefulLife => "Useful Life",
            RemainingLife => "Remaining Life",
            Country => "Country",
            Region => "Region",
            City => "City",
            Coordinates => "Coordinates",
            Building => "Building",
            Floor => "Floor",
            RoomOffice => "Room/Office",
            EntityName => "Entity Name",
            EntityCode => "Entity Code",
            AccountingGroupCode => "Accounting Group Code",
            AccountingGroupDesc => "Accounting Group Desc",
        }
    }

    pub fn arabic_label(self) -> &'static str {
        match self {
            AssetUniqueNo => "رقم الأصل الفريد",
            Description => "وصف الأصل",
            TagNumber => "رقم البطاقة/الوسم",
            UnitOfMeasure => "وحدة القياس",
            Quantity => "العدد",
            Manufacturer => "المصنّع",
            DatePlacedInService => "تاريخ الدخول في الخدمة",
            Cost => "التكلفة",
            DepreciationExpense => "قسط الاهلاك",
            AccumulatedDepreciation => "الاستهلاك المتراكم",
            ResidualValue => "القيمة المتبقية",
            NetBookValue => "القيمة الدفترية",
            UsefulLife => "العمر الإنتاجي",
            RemainingLife => "العمر المتبقي",
            Country => "الدولة",
            Region => "المنطقة",
            City => "المدينة",
            Coordinates => "الإحداثيات",
            Building => "رقم المبنى",
            Floor => "رقم الدور",
            RoomOffice => "رقم الغرفة/المكتب",
            EntityName => "اسم الجهة",
            EntityCode => "رمز الجهة",
            AccountingGroupCode => "رمز المجموعة المحاسبية",
            AccountingGroupDesc => "وصف المجموعة المحاسبية",
        }
    }

    /// Known header spellings, Arabic and English, in preference order.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            AssetUniqueNo => &[
                "رقم الأصل الفريد",
                "رقم الأصل الفريد بالجهة",
                "الرقم التسلسلي",
                "Unique Asset Number",
                "Unique Asset Number in the entity",
            ],
            Description => &[
                "وصف الأصل",
                "Asset Description",
                "Asset Description For Maintenance Purpose",
                "الوصف",
            ],
            TagNumber => &["Tag number", "رقم البطاقة", "الوسم", "الباركود"],
            UnitOfMeasure => &["وحدة القياس", "Base Unit of Measure"],
            Quantity => &["العدد", "Quantity"],
            Manufacturer => &["المصنع", "Manufacturer"],
            DatePlacedInService => &["تاريخ الدخول في الخدمة", "Date Placed in Service"],
            Cost => &["التكلفة", "Cost"],
            DepreciationExpense => &["قسط الاهلاك", "Depreciation amount", "Depreciation Expense"],
            AccumulatedDepreciation => &["الاستهلاك المتراكم", "Accumulated Depreciation"],
            ResidualValue => &["Residual Value", "القيمة المتبقية"],
            NetBookValue => &["Net Book Value", "القيمة الدفترية"],
            UsefulLife => &["العمر الإنتاجي", "Useful Life"],
            RemainingLife => &["Remaining useful life", "المتبقي"],
            Country => &["الدولة", "Country"],
            Region => &["المنطقة", "Region"],
            City => &["المدينة", "City"],
            Coordinates => &["الإحداثيات", "إحداثيات", "Geographical Coordinates"],
            Building => &["رقم المبنى", "Building Number", "Building"],
            Floor => &["رقم الدور", "Floors Number", "Floor"],
            RoomOffice => &["رقم الغرفة/المكتب", "Room/office Number", "Room"],
            EntityName => &["اسم الجهة"],
            EntityCode => &["رمز الجهة"],
            AccountingGroupCode => &[
                "رمز المجموعة المحاسبية",
                "GL account",
                "accounting group code",
            ],
            AccountingGroupDesc => &["وصف المجموعة المحاسبية", "accounting group"],
        }
    }

    /// Whether the field holds a monetary amount.
    pub fn is_financial(self) -> bool {
        matches!(
            self,
            Cost | DepreciationExpense | AccumulatedDepreciation | ResidualValue | NetBookValue
        )
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CanonicalField {
    type Err = AppError;

    /// Accepts the English label in any case/spacing, e.g. `net book value`.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_header(s);
        CanonicalField::ALL
            .into_iter()
            .find(|f| normalize_header(f.label()) == wanted)
            .ok_or_else(|| AppError::UnknownField(s.to_string()))
    }
}

impl Serialize for CanonicalField {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Comparison form of a header: trimmed, whitespace collapsed, lowercased.
pub fn normalize_header(raw: &str) -> String {
    clean_header(raw).to_lowercase()
}

/// Mapping from canonical field to the raw header that carries it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ColumnMap {
    entries: Vec<(CanonicalField, Option<String>)>,
}

impl ColumnMap {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, c)| c.as_deref())
    }

    /// Override the header for `field`; `None` marks it absent.
    ///
    /// The header must be one of the dataset's columns.
    pub fn set(
        &mut self,
        dataset: &Dataset,
        field: CanonicalField,
        column: Option<&str>,
    ) -> Result<()> {
        if let Some(c) = column {
            if !dataset.has_column(c) {
                log::warn!("rejected mapping {} -> '{}': no such column", field, c);
                return Err(AppError::UnknownColumn(c.to_string()));
            }
        }
        let column = column.map(str::to_string);
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = column,
            None => self.entries.push((field, column)),
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, Option<&str>)> {
        self.entries.iter().map(|(f, c)| (*f, c.as_deref()))
    }

    pub fn matched_count(&self) -> usize {
        self.entries.iter().filter(|(_, c)| c.is_some()).count()
    }
}

/// Resolve every canonical field against `headers`.
///
/// Exact normalized matches are tried first, then substring matches, each in
/// alias order and then column order; the first hit wins. Unmatched fields map
/// to `None`.
pub fn resolve_columns<S: AsRef<str>>(headers: &[S]) -> ColumnMap {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();

    let entries = CanonicalField::ALL
        .into_iter()
        .map(|field| {
            let aliases: Vec<String> = field.aliases().iter().map(|a| normalize_header(a)).collect();
            let hit = find_column(&aliases, &normalized, |alias, col| col == alias)
                .or_else(|| find_column(&aliases, &normalized, |alias, col| col.contains(alias)));
            (field, hit.map(|i| headers[i].as_ref().to_string()))
        })
        .collect();

    let map = ColumnMap { entries };
    log::debug!(
        "resolved {}/{} canonical fields",
        map.matched_count(),
        CanonicalField::ALL.len()
    );
    map
}

fn find_column(
    aliases: &[String],
    columns: &[String],
    matches: impl Fn(&str, &str) -> bool,
) -> Option<usize> {
    aliases
        .iter()
        .filter(|alias| !alias.is_empty())
        .find_map(|alias| columns.iter().position(|col| matches(alias, col)))
}

/// A titled group of fields shown together on detail views.
pub struct FieldGroup {
    pub title: &'static str,
    pub arabic_title: &'static str,
    pub fields: &'static [CanonicalField],
}

pub const FIELD_GROUPS: [FieldGroup; 4] = [
    FieldGroup {
        title: "Identification",
        arabic_title: "أولاً: بيانات التعريف",
        fields: &[
            EntityName,
            EntityCode,
            AssetUniqueNo,
            TagNumber,
            AccountingGroupCode,
            AccountingGroupDesc,
        ],
    },
    FieldGroup {
        title: "Specifications",
        arabic_title: "ثانياً: المواصفات",
        fields: &[
            Description,
            Manufacturer,
            UnitOfMeasure,
            Quantity,
            DatePlacedInService,
            UsefulLife,
            RemainingLife,
        ],
    },
    FieldGroup {
        title: "Financial values",
        arabic_title: "ثالثاً: القيم المالية",
        fields: &[
            Cost,
            DepreciationExpense,
            AccumulatedDepreciation,
            ResidualValue,
            NetBookValue,
        ],
    },
    FieldGroup {
        title: "Location",
        arabic_title: "رابعاً: الموقع",
        fields: &[Country, Region, City, Building, Floor, RoomOffice, Coordinates],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_alias_returns_verbatim_header() {
        let headers = ["رقم الأصل الفريد بالجهة", "Asset Description", "Cost", "المدينة"];
        let map = resolve_columns(&headers);
        assert_eq!(map.get(AssetUniqueNo), Some("رقم الأصل الفريد بالجهة"));
        assert_eq!(map.get(Description), Some("Asset Description"));
        assert_eq!(map.get(Cost), Some("Cost"));
        assert_eq!(map.get(City), Some("المدينة"));
    }

    #[test]
    fn resolution_ignores_case_and_whitespace() {
        let padded = resolve_columns(&["  Cost "]);
        let plain = resolve_columns(&["Cost"]);
        assert_eq!(padded.get(Cost), Some("  Cost "));
        assert_eq!(plain.get(Cost), Some("Cost"));
        assert_eq!(resolve_columns(&["COST"]).get(Cost), Some("COST"));
        assert_eq!(resolve_columns(&["net   book value"]).get(NetBookValue), Some("net   book value"));
    }

    #[test]
    fn unmatched_field_is_absent() {
        let map = resolve_columns(&["Something else"]);
        for field in CanonicalField::ALL {
            assert_eq!(map.get(field), None, "{field}");
        }
        assert_eq!(resolve_columns::<&str>(&[]).matched_count(), 0);
    }

    #[test]
    fn exact_match_beats_earlier_substring_match() {
        // "Cost Center Cost" contains the alias, but the exact column wins.
        let map = resolve_columns(&["Cost Center Cost", "Cost"]);
        assert_eq!(map.get(Cost), Some("Cost"));
    }

    #[test]
    fn substring_match_takes_first_alias_then_first_column() {
        let map = resolve_columns(&["Total Cost (SAR)", "Original Cost"]);
        assert_eq!(map.get(Cost), Some("Total Cost (SAR)"));

        // The earlier alias wins even when its column comes later.
        let map = resolve_columns(&["Building Number 2", "المبنى رقم المبنى"]);
        assert_eq!(map.get(Building), Some("المبنى رقم المبنى"));
    }

    #[test]
    fn override_requires_existing_column() {
        let ds = Dataset::prepare("x", vec!["Asset No".into(), "Cost".into()], vec![]);
        let mut map = resolve_columns(&ds.columns);
        assert_eq!(map.get(AssetUniqueNo), None);

        map.set(&ds, AssetUniqueNo, Some("Asset No")).unwrap();
        assert_eq!(map.get(AssetUniqueNo), Some("Asset No"));

        assert!(matches!(
            map.set(&ds, Cost, Some("Price")),
            Err(AppError::UnknownColumn(_))
        ));
        assert_eq!(map.get(Cost), Some("Cost"));

        map.set(&ds, Cost, None).unwrap();
        assert_eq!(map.get(Cost), None);
    }

    #[test]
    fn field_names_parse_loosely() {
        assert_eq!("net book value".parse::<CanonicalField>().unwrap(), NetBookValue);
        assert_eq!(" Room/Office ".parse::<CanonicalField>().unwrap(), RoomOffice);
        assert!("price".parse::<CanonicalField>().is_err());
    }
}
