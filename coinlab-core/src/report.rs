//! Tabular view of an order history.
//!
//! Columns are the fixed order fields followed by the union of every
//! strategy's snapshot columns. A cell a strategy never fills is unset.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{IndicatorSnapshot, Order, OrderHistory, OrderSide};
use crate::strategy::round_to;

pub const ORDER_COLUMNS: [&str; 5] = ["date", "price", "size", "value", "order_type"];

/// Snapshot columns of the built-in strategies, in display order.
pub const INDICATOR_COLUMNS: [&str; 5] =
    ["sma_fast", "sma_slow", "rsi", "forecast", "predicted_change"];

const SIZE_DECIMALS: i32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
    pub date: NaiveDate,
    pub price: f64,
    /// Rounded to 6 decimals.
    pub size: f64,
    pub value: f64,
    pub order_type: OrderSide,
    #[serde(flatten)]
    pub indicators: IndicatorSnapshot,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            date: order.date,
            price: order.price,
            size: round_to(order.size, SIZE_DECIMALS),
            value: order.value,
            order_type: order.order_type,
            indicators: order.indicators.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTable {
    columns: Vec<String>,
    rows: Vec<OrderRow>,
}

impl OrderTable {
    pub fn from_history(history: &OrderHistory) -> Self {
        let extra: BTreeSet<&str> = history
            .iter()
            .flat_map(|order| order.indicators.keys())
            .map(String::as_str)
            .filter(|key| !INDICATOR_COLUMNS.contains(key))
            .collect();

        let columns = ORDER_COLUMNS
            .iter()
            .chain(INDICATOR_COLUMNS.iter())
            .copied()
            .chain(extra)
            .map(str::to_string)
            .collect();

        Self {
            columns,
            rows: history.iter().map(OrderRow::from).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[OrderRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Formatted cell, `None` when unset.
    pub fn cell(&self, row: usize, column: &str) -> Option<String> {
        let r = self.rows.get(row)?;
        match column {
            "date" => Some(r.date.format("%Y-%m-%d").to_string()),
            "price" => Some(r.price.to_string()),
            "size" => Some(r.size.to_string()),
            "value" => Some(r.value.to_string()),
            "order_type" => Some(r.order_type.to_string()),
            other => r.indicators.get(other).map(f64::to_string),
        }
    }

    /// Rows as strings in column order, unset cells empty.
    pub fn records(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        (0..self.rows.len()).map(move |row| {
            self.columns
                .iter()
                .map(|column| self.cell(row, column).unwrap_or_default())
                .collect()
        })
    }
}
