use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::Money;

/// Recognises and normalises rupee-formatted price text such as
/// `₹1,09,900.00`, `Rs. 499` or a raw `109900.0`.
pub struct PriceTracker {
    price_regex: Regex,
    marker_regex: Regex,
}

impl Default for PriceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceTracker {
    pub fn new() -> Self {
        PriceTracker {
            // Currency marker, optional whitespace, digits with optional
            // grouping separators and fraction.
            price_regex: Regex::new(r"(?:₹|\bRs\.)\s*\d[\d,]*(?:\.\d+)?").unwrap(),
            marker_regex: Regex::new(r"(?i)\brs\.").unwrap(),
        }
    }

    /// First currency-marked price token in `text`, verbatim.
    pub fn find_marked_price<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.price_regex.find(text).map(|m| m.as_str())
    }

    /// Strips everything but digits and the decimal point, then parses.
    /// Empty or malformed input (e.g. two decimal points) yields `None`.
    pub fn parse(&self, text: &str) -> Option<Money> {
        // "Rs." carries a dot that is not a decimal point.
        let unmarked = self.marker_regex.replace_all(text, " ");
        let cleaned: String = unmarked
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let cleaned = cleaned.trim_end_matches('.');
        if cleaned.is_empty() {
            return None;
        }
        Decimal::from_str(cleaned).ok().and_then(Money::new)
    }
}
