//! Engine configuration and the mutable cash/position state of one run.

use crate::domain::{Order, OrderSide, Position, FLAT_EPSILON};
use crate::sizing::FractionalSizer;

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub initial_balance: f64,
    pub sizer: FractionalSizer,
}

impl EngineConfig {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            sizer: FractionalSizer::default(),
        }
    }

    pub fn with_sizer(mut self, sizer: FractionalSizer) -> Self {
        self.sizer = sizer;
        self
    }
}

/// Cash plus the single open position. Owned by one run, never shared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub position: Position,
}

impl Portfolio {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            cash: initial_balance,
            position: Position::flat(),
        }
    }

    /// Mark-to-market value at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.market_value(price)
    }

    /// Book a fill: move its value between cash and the position.
    pub fn apply(&mut self, order: &Order) {
        match order.order_type {
            OrderSide::Buy => {
                self.cash -= order.value;
                self.position = Position {
                    size: self.position.size + order.size,
                    entry_price: order.price,
                };
            }
            OrderSide::Sell => {
                self.cash += order.value;
                let size = self.position.size - order.size;
                self.position = if size.abs() < FLAT_EPSILON {
                    Position::flat()
                } else {
                    Position { size, ..self.position }
                };
            }
        }
    }
}
