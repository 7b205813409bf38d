use once_cell::sync::Lazy;
use regex::Regex;

/// Company numbers are eight characters: either all digits (zero-padded) or a
/// two-letter jurisdiction prefix followed by six digits.
static COMPANY_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Z]{2}\d{6}|\d{1,8})$").expect("valid company number regex"));

/// Known jurisdiction/registry prefixes
const KNOWN_PREFIXES: &[&str] = &["SC", "NI", "OC", "SO", "NC", "FC", "SF", "NF"];

/// Whether the input can be normalized to a Companies House number
pub fn validate_format(company_number: &str) -> bool {
    let cleaned = company_number.trim().to_uppercase();
    COMPANY_NUMBER_RE.is_match(&cleaned)
}

/// Normalize a company number: uppercase any prefix and zero-pad the numeric
/// part to eight characters total.
pub fn normalize(company_number: &str) -> String {
    let cleaned = company_number.trim().to_uppercase();

    if cleaned.len() >= 2 && cleaned[..2].chars().all(|c| c.is_ascii_alphabetic()) {
        let (prefix, digits) = cleaned.split_at(2);
        return format!("{}{:0>6}", prefix, digits);
    }

    format!("{:0>8}", cleaned)
}

/// Jurisdiction implied by the number's prefix
pub fn jurisdiction(company_number: &str) -> &'static str {
    let normalized = normalize(company_number);

    match normalized.get(..2) {
        Some("SC") | Some("SO") | Some("SF") => "scotland",
        Some("NI") | Some("NC") | Some("NF") => "northern-ireland",
        Some(prefix) if KNOWN_PREFIXES.contains(&prefix) => "england-wales",
        _ => "england-wales",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_format() {
        // REQUIREMENT: Company numbers are validated before any API call
        // PURPOSE: Verify accepted and rejected shapes
        assert!(validate_format("00000006"));
        assert!(validate_format("6"));
        assert!(validate_format("SC123456"));
        assert!(validate_format("ni000123"));
        assert!(!validate_format("ABC12345"));
        assert!(!validate_format("123456789"));
        assert!(!validate_format(""));
    }

    #[test]
    fn test_normalize() {
        // REQUIREMENT: Numeric company numbers are zero-padded to 8 characters
        // PURPOSE: Verify padding and prefix handling
        assert_eq!(normalize("6"), "00000006");
        assert_eq!(normalize("00000006"), "00000006");
        assert_eq!(normalize("sc1234"), "SC001234");
        assert_eq!(normalize("NI000123"), "NI000123");
    }

    #[test]
    fn test_jurisdiction() {
        // REQUIREMENT: The prefix identifies the registering jurisdiction
        // PURPOSE: Verify the prefix table
        assert_eq!(jurisdiction("SC123456"), "scotland");
        assert_eq!(jurisdiction("NI000123"), "northern-ireland");
        assert_eq!(jurisdiction("00000006"), "england-wales");
    }
}
