use serde::{Deserialize, Serialize};

pub mod money;
pub mod product;

// Re-exports for convenience
pub use money::*;
pub use product::*;

/// Result of one extraction pass over a rendered page. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub price: Option<Money>,
    pub in_stock: bool,
}

impl Observation {
    /// What an unreadable page degrades to.
    pub const MISSING: Observation = Observation { price: None, in_stock: false };

    pub fn stock_label(&self) -> &'static str {
        if self.in_stock { "In Stock" } else { "Out of Stock" }
    }
}
