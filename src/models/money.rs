use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Non-negative rupee amount. Ordering and equality are numeric, so
/// `₹499` and `₹499.00` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Option<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            None
        } else {
            Some(Money(amount))
        }
    }

    /// Parses a bare numeric amount such as `"500"` or `"1299.50"`.
    pub fn parse_amount(text: &str) -> Option<Self> {
        Decimal::from_str(text.trim()).ok().and_then(Self::new)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl From<u32> for Money {
    fn from(value: u32) -> Self {
        Money(Decimal::from(value))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{:.2}", self.0)
    }
}
