use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::Money;

/// Decision for one observation of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertAction {
    /// A new deal, or a lower price than the last alert. Deliver, then
    /// call [`AlertState::record_notified`].
    Notify(Money),
    /// The price climbed above the last alerted price; forget it so the
    /// next qualifying price alerts again.
    Reset,
    NoAction,
}

/// Last notified price per product url.
///
/// A record exists only after a delivered alert and is dropped when the
/// price rises past it. Notified prices for one url therefore strictly
/// decrease between resets.
#[derive(Debug, Default, Clone)]
pub struct AlertState {
    last_notified: HashMap<String, Money>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure decision: does not touch the records.
    pub fn evaluate(
        &self,
        url: &str,
        price: Option<Money>,
        in_stock: bool,
        threshold: Money,
    ) -> AlertAction {
        let Some(price) = price else {
            return AlertAction::NoAction;
        };
        let last = self.last_notified.get(url).copied();

        if !in_stock || price > threshold {
            return match last {
                Some(last) if price > last => AlertAction::Reset,
                _ => AlertAction::NoAction,
            };
        }

        match last {
            Some(last) if price >= last => AlertAction::NoAction,
            _ => AlertAction::Notify(price),
        }
    }

    /// Call only once the alert for `price` was actually delivered.
    pub fn record_notified(&mut self, url: &str, price: Money) {
        self.last_notified.insert(url.to_string(), price);
    }

    pub fn reset(&mut self, url: &str) -> bool {
        self.last_notified.remove(url).is_some()
    }

    pub fn last_notified(&self, url: &str) -> Option<Money> {
        self.last_notified.get(url).copied()
    }

    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}
