use serde::{Deserialize, Serialize};

/// Sizes below this many units count as flat. Guards against re-entry being
/// blocked by rounding residue after a close.
pub const FLAT_EPSILON: f64 = 1e-9;

/// The single open position. Long-only: `size` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub size: f64,
    pub entry_price: f64,
}

impl Position {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.size.abs() < FLAT_EPSILON
    }

    pub fn is_long(&self) -> bool {
        self.size >= FLAT_EPSILON
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.size * current_price
    }
}
