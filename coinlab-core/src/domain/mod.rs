//! Domain types: bars, positions, orders.

pub mod bar;
pub mod order;
pub mod position;

pub use bar::PriceBar;
pub use order::{IndicatorSnapshot, Order, OrderHistory, OrderSide};
pub use position::{Position, FLAT_EPSILON};
