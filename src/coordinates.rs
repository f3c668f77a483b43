use serde::Serialize;

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

const ARABIC_COMMA: char = '\u{060C}';

/// Parse a free-text `"lat,lon"` field.
///
/// The Arabic comma is accepted as the separator. Returns `None` unless there
/// are exactly two numeric tokens with the latitude in [-90, 90] and the
/// longitude in [-180, 180].
pub fn parse_coordinates(text: &str) -> Option<Coordinates> {
    let normalized = text.trim().replace(ARABIC_COMMA, ",");
    let parts: Vec<&str> = normalized.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return None;
    }

    let lat = parts[0].parse::<f64>().ok()?;
    let lon = parts[1].parse::<f64>().ok()?;
    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return None;
    }
    Some(Coordinates { lat, lon })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pair() {
        assert_eq!(
            parse_coordinates("24.7136,46.6753"),
            Some(Coordinates { lat: 24.7136, lon: 46.6753 })
        );
        assert_eq!(
            parse_coordinates(" 24.7136 , 46.6753 "),
            Some(Coordinates { lat: 24.7136, lon: 46.6753 })
        );
    }

    #[test]
    fn arabic_comma_is_a_separator() {
        assert_eq!(
            parse_coordinates("24.7136،46.6753"),
            parse_coordinates("24.7136,46.6753")
        );
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert_eq!(parse_coordinates("91,46"), None);
        assert_eq!(parse_coordinates("-90.5,46"), None);
        assert_eq!(parse_coordinates("24,180.01"), None);
        assert!(parse_coordinates("-90,-180").is_some());
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert_eq!(parse_coordinates("abc,46"), None);
        assert_eq!(parse_coordinates("24.7136"), None);
        assert_eq!(parse_coordinates("1,2,3"), None);
        assert_eq!(parse_coordinates(""), None);
        assert_eq!(parse_coordinates("NaN,46"), None);
        assert_eq!(parse_coordinates("24,inf"), None);
    }
}
