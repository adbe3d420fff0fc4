//! Executed orders and the per-run order history.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::bar::PriceBar;
use super::position::Position;

/// Indicator readings captured at fill time, keyed by column name.
pub type IndicatorSnapshot = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed market order. Immutable once created.
///
/// `value` is always `size * price`. `size` keeps full precision here; the
/// reporting table rounds it to 6 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub price: f64,
    pub size: f64,
    pub value: f64,
    pub order_type: OrderSide,
    pub indicators: IndicatorSnapshot,
}

impl Order {
    /// Build a fill at the bar's reference price.
    pub fn fill(
        bar_index: usize,
        bar: &PriceBar,
        order_type: OrderSide,
        size: f64,
        indicators: IndicatorSnapshot,
    ) -> Self {
        let price = bar.reference_price();
        Self {
            bar_index,
            timestamp: bar.timestamp,
            date: bar.date(),
            price,
            size,
            value: size * price,
            order_type,
            indicators,
        }
    }

    /// Size with sign applied: positive for buys, negative for sells.
    pub fn signed_size(&self) -> f64 {
        match self.order_type {
            OrderSide::Buy => self.size,
            OrderSide::Sell => -self.size,
        }
    }
}

/// Append-only log of fills for one backtest run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderHistory {
    orders: Vec<Order>,
}

impl OrderHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, order: Order) {
        self.orders.push(order);
    }

    pub fn as_slice(&self) -> &[Order] {
        &self.orders
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Order> {
        self.orders.iter()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn last(&self) -> Option<&Order> {
        self.orders.last()
    }

    pub fn buys(&self) -> impl Iterator<Item = &Order> {
        self.orders
            .iter()
            .filter(|o| o.order_type == OrderSide::Buy)
    }

    pub fn sells(&self) -> impl Iterator<Item = &Order> {
        self.orders
            .iter()
            .filter(|o| o.order_type == OrderSide::Sell)
    }

    /// Rebuild the position by replaying every fill from a flat start.
    pub fn replay_position(&self) -> Position {
        self.orders
            .iter()
            .fold(Position::flat(), |pos, order| match order.order_type {
                OrderSide::Buy => Position {
                    size: pos.size + order.size,
                    entry_price: order.price,
                },
                OrderSide::Sell => {
                    let size = pos.size - order.size;
                    if size.abs() < super::position::FLAT_EPSILON {
                        Position::flat()
                    } else {
                        Position { size, ..pos }
                    }
                }
            })
    }

    /// True when sides alternate buy, sell, buy, ... starting with a buy.
    pub fn alternates(&self) -> bool {
        self.orders.iter().enumerate().all(|(i, o)| {
            let expected = if i % 2 == 0 {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            };
            o.order_type == expected
        })
    }
}

impl<'a> IntoIterator for &'a OrderHistory {
    type Item = &'a Order;
    type IntoIter = std::slice::Iter<'a, Order>;

    fn into_iter(self) -> Self::IntoIter {
        self.orders.iter()
    }
}
