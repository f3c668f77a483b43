use serde::{Serialize, Serializer};
use std::fmt;

/// A single cell of an uploaded asset register.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum CellValue {
    Text(String),
    Number(f64),
    #[default]
    Missing,
}

impl CellValue {
    /// Build a text cell, treating blank strings as missing.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            CellValue::Missing
        } else if trimmed.len() == s.len() {
            CellValue::Text(s)
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        coerce_number(self)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Missing => Ok(()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            _ => serializer.serialize_none(),
        }
    }
}

/// Render a number the way a spreadsheet user expects to see it typed.
///
/// Whole numbers drop the fractional part (`1500`, not `1500.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Coerce a cell into a number, returning `None` for anything that isn't one.
///
/// Text is accepted with Arabic-Indic digits, the Arabic decimal separator and
/// thousands separators.
pub fn coerce_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Number(_) | CellValue::Missing => None,
        CellValue::Text(s) => parse_number(s),
    }
}

/// Parse free text as a number; see [`coerce_number`].
pub fn parse_number(s: &str) -> Option<f64> {
    let mut cleaned = String::with_capacity(s.len());
    for c in s.trim().chars() {
        match c {
            '0'..='9' | '.' | '-' | '+' | 'e' | 'E' => cleaned.push(c),
            '\u{0660}'..='\u{0669}' => cleaned.push(shift_digit(c, '\u{0660}')),
            '\u{06F0}'..='\u{06F9}' => cleaned.push(shift_digit(c, '\u{06F0}')),
            '\u{066B}' => cleaned.push('.'),
            ',' | '\u{066C}' | ' ' | '\u{00A0}' => {}
            _ => return None,
        }
    }
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn shift_digit(c: char, zero: char) -> char {
    let offset = c as u32 - zero as u32;
    char::from_digit(offset, 10).unwrap_or('0')
}

/// Two decimals with thousands separators: `1234567.891` → `1,234,567.89`.
pub fn format_amount(n: f64) -> String {
    let negative = n < 0.0;
    let fixed = format!("{:.2}", n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative && fixed.chars().any(|c| c != '0' && c != '.') {
        format!("-{}.{}", grouped, frac_part)
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_drops_trailing_zero_fraction() {
        assert_eq!(CellValue::Number(1500.0).to_string(), "1500");
        assert_eq!(CellValue::Number(1500.5).to_string(), "1500.5");
        assert_eq!(CellValue::Missing.to_string(), "");
    }

    #[test]
    fn blank_text_is_missing() {
        assert!(CellValue::text("   ").is_missing());
        assert_eq!(CellValue::text(" pump "), CellValue::Text("pump".into()));
    }

    #[test]
    fn coerces_formatted_and_arabic_numbers() {
        assert_eq!(parse_number("1,250.75"), Some(1250.75));
        assert_eq!(parse_number("١٢٣٫٥"), Some(123.5));
        assert_eq!(parse_number("۱۲"), Some(12.0));
        assert_eq!(parse_number(" -40 "), Some(-40.0));
    }

    #[test]
    fn non_numeric_text_becomes_missing() {
        assert_eq!(coerce_number(&CellValue::text("n/a")), None);
        assert_eq!(coerce_number(&CellValue::text("12 SAR")), None);
        assert_eq!(coerce_number(&CellValue::Number(f64::NAN)), None);
        assert_eq!(coerce_number(&CellValue::Missing), None);
    }

    #[test]
    fn amounts_are_grouped() {
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(999.0), "999.00");
        assert_eq!(format_amount(-1000.5), "-1,000.50");
        assert_eq!(format_amount(0.0), "0.00");
    }
}
