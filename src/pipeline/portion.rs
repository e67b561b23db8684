use regex::Regex;
use std::sync::OnceLock;

use crate::models::ParsedPortion;

const NUMBER: &str = r"(\d+(?:[.,]\d+)?)";

/// Number immediately followed by its unit, e.g. `250ml`.
fn attached_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"{}([A-Za-z]+)", NUMBER)).expect("portion regex is valid"))
}

/// Number and unit separated by whitespace, e.g. `1.5 cups`.
fn spaced_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"{}\s+([A-Za-z]+)", NUMBER)).expect("portion regex is valid"))
}

/// Extract `<number><unit>` from a free-form portion string. An attached
/// unit wins over a spaced one anywhere in the text.
/// Falls back to 100 g when nothing matches; never fails.
pub fn parse_portion(text: &str) -> ParsedPortion {
    let Some(caps) = attached_regex()
        .captures(text)
        .or_else(|| spaced_regex().captures(text))
    else {
        return ParsedPortion::default();
    };

    let quantity = caps[1].replace(',', ".").parse::<f64>();
    match quantity {
        Ok(quantity) if quantity.is_finite() => ParsedPortion {
            quantity,
            unit: caps[2].to_lowercase(),
        },
        _ => ParsedPortion::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portion(quantity: f64, unit: &str) -> ParsedPortion {
        ParsedPortion {
            quantity,
            unit: unit.to_string(),
        }
    }

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_portion("250ml"), portion(250.0, "ml"));
        assert_eq!(parse_portion("100g"), portion(100.0, "g"));
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(parse_portion("some"), portion(100.0, "g"));
        assert_eq!(parse_portion(""), portion(100.0, "g"));
        assert_eq!(parse_portion("250"), portion(100.0, "g"));
    }

    #[test]
    fn test_parse_decimal_and_spacing() {
        assert_eq!(parse_portion("1.5 cups"), portion(1.5, "cups"));
        assert_eq!(parse_portion("about 0,5L of milk"), portion(0.5, "l"));
    }

    #[test]
    fn test_attached_unit_preferred_over_spaced_word() {
        assert_eq!(parse_portion("2 x 100g"), portion(100.0, "g"));
        assert_eq!(parse_portion("250 ml"), portion(250.0, "ml"));
        assert_eq!(parse_portion("1 cup or 240ml"), portion(240.0, "ml"));
    }

    #[test]
    fn test_parse_takes_first_match() {
        assert_eq!(parse_portion("200g (2 slices)"), portion(200.0, "g"));
    }
}
