//! Vendor-code normalization
//!
//! WB cabinets carry raw article strings like "wild273_синий_XL"; the
//! warehouse keys everything by the canonical `wildNNN` form.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WILD_PATTERN: Regex = Regex::new(r"^wild(\d+)").unwrap();
    static ref WORD_PATTERN: Regex = Regex::new(r"^[a-zA-Z\s]+$").unwrap();
}

/// Extracts the canonical `wildNNN` code from a raw article string. Plain
/// alphabetic articles pass through unchanged, as does anything unrecognized.
pub fn normalize_vendor_code(raw: &str) -> String {
    if let Some(captures) = WILD_PATTERN.captures(raw) {
        return format!("wild{}", &captures[1]);
    }
    if WORD_PATTERN.is_match(raw) {
        return raw.to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wild_code_with_suffix() {
        assert_eq!(normalize_vendor_code("wild273_blue_XL"), "wild273");
        assert_eq!(normalize_vendor_code("wild5"), "wild5");
        assert_eq!(normalize_vendor_code("wild100500-some-tail"), "wild100500");
    }

    #[test]
    fn test_plain_word_passes_through() {
        assert_eq!(normalize_vendor_code("samples"), "samples");
        assert_eq!(normalize_vendor_code("test article"), "test article");
    }

    #[test]
    fn test_unrecognized_passes_through() {
        assert_eq!(normalize_vendor_code("abc123"), "abc123");
        assert_eq!(normalize_vendor_code(""), "");
    }
}
