//! Quality-control flag handling for ARGO measurements.

/// Numeric QC flag: the first digit in the flag text.
pub fn parse_qc(flag: &str) -> Option<u8> {
    flag.chars().find_map(|c| c.to_digit(10)).map(|d| d as u8)
}

/// Pick the adjusted value when it is present, flagged good or probably good
/// (1 or 2), and its flag is not below the raw flag. Otherwise keep the raw value.
pub fn prefer_adjusted(
    raw: Option<f64>,
    raw_qc: Option<u8>,
    adjusted: Option<f64>,
    adjusted_qc: Option<u8>,
) -> Option<f64> {
    let use_adjusted = match (adjusted, adjusted_qc) {
        (Some(_), Some(adj_qc @ (1 | 2))) => raw_qc.map_or(true, |raw_qc| adj_qc >= raw_qc),
        _ => false,
    };
    if use_adjusted {
        adjusted
    } else {
        raw
    }
}

/// Whitespace-split `text` and encode the words as a JSON array.
pub fn as_json(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    serde_json::to_string(&words).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qc() {
        assert_eq!(parse_qc("1"), Some(1));
        assert_eq!(parse_qc("b'4'"), Some(4));
        assert_eq!(parse_qc(" "), None);
        assert_eq!(parse_qc(""), None);
    }

    #[test]
    fn test_prefer_adjusted() {
        // good adjusted value replaces raw
        assert_eq!(prefer_adjusted(Some(10.0), Some(1), Some(10.5), Some(1)), Some(10.5));
        // raw flag missing
        assert_eq!(prefer_adjusted(Some(10.0), None, Some(10.5), Some(2)), Some(10.5));
        // adjusted flagged bad
        assert_eq!(prefer_adjusted(Some(10.0), Some(1), Some(10.5), Some(4)), Some(10.0));
        // adjusted flag lower than raw flag
        assert_eq!(prefer_adjusted(Some(10.0), Some(3), Some(10.5), Some(2)), Some(10.0));
        // no adjusted value
        assert_eq!(prefer_adjusted(Some(10.0), Some(1), None, Some(1)), Some(10.0));
        assert_eq!(prefer_adjusted(None, None, None, None), None);
    }

    #[test]
    fn test_as_json() {
        assert_eq!(as_json("  PRES   TEMP PSAL "), r#"["PRES","TEMP","PSAL"]"#);
        assert_eq!(as_json(""), "[]");
    }
}
