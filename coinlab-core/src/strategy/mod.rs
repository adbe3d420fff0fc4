//! Strategy state machines.
//!
//! Every strategy has two states, flat and long, and only two transitions:
//! flat -> long on `EnterLong` and long -> flat on `ExitToFlat`. There are no
//! shorts and no pyramiding.
//!
//! Strategies keep no hidden mutable fields. Whatever must survive from one
//! bar to the next lives in the strategy's `State` value, which the engine
//! passes into `on_bar` and receives back in the returned [`Step`].

use std::fmt;

use crate::domain::{IndicatorSnapshot, Order, Position, PriceBar};
use crate::indicators::{Indicator, IndicatorValues};

pub mod arima_forecast;
pub mod params;
pub mod rsi_threshold;
pub mod sma_crossover;
pub mod spec;

pub use arima_forecast::{ArimaForecast, ArimaParams, ArimaState};
pub use params::{ParamKind, ParamSpec, ParamValue, StrategyParams};
pub use rsi_threshold::{RsiParams, RsiState, RsiThreshold};
pub use sma_crossover::{CrossoverState, SmaCrossover, SmaCrossoverParams};
pub use spec::{StrategyKind, StrategySpec};

/// What a strategy wants done on the current bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    NoOp,
    /// Open a long position. `None` means the full-cash size.
    EnterLong { size: Option<f64> },
    /// Close the whole position.
    ExitToFlat,
}

impl Action {
    pub fn enter_long() -> Self {
        Action::EnterLong { size: None }
    }
}

/// Result of one `on_bar` call: the action and the next state.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<S> {
    pub action: Action,
    pub state: S,
}

impl<S> Step<S> {
    pub fn new(action: Action, state: S) -> Self {
        Self { action, state }
    }

    pub fn hold(state: S) -> Self {
        Self::new(Action::NoOp, state)
    }
}

/// Read-only access to precomputed indicators, limited to the current and
/// previous bar so a strategy cannot peek ahead.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorView<'a> {
    values: &'a IndicatorValues,
    index: usize,
}

impl<'a> IndicatorView<'a> {
    pub fn new(values: &'a IndicatorValues, index: usize) -> Self {
        Self { values, index }
    }

    /// Value on the current bar, `None` while warming up.
    pub fn current(&self, name: &str) -> Option<f64> {
        self.values.get(name, self.index).filter(|v| !v.is_nan())
    }

    /// Value on the previous bar, `None` on the first bar or while warming up.
    pub fn previous(&self, name: &str) -> Option<f64> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.values.get(name, i))
            .filter(|v| !v.is_nan())
    }
}

/// Everything a strategy sees on one bar.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub index: usize,
    pub bar: &'a PriceBar,
    /// Trailing window ending with `bar`, at most `Strategy::window()` long.
    pub history: &'a [PriceBar],
    pub indicators: IndicatorView<'a>,
    pub position: Position,
}

/// A trading rule the engine can drive.
pub trait Strategy: Send + Sync {
    type State: Clone + Default + fmt::Debug + Send;

    fn name(&self) -> &'static str;

    fn schema() -> &'static [ParamSpec]
    where
        Self: Sized;

    /// Indicators to precompute before the loop.
    fn indicators(&self) -> Vec<Box<dyn Indicator>>;

    /// First bar index at which `on_bar` is called.
    fn first_decision_index(&self) -> usize;

    /// Shortest series that yields at least one decision.
    fn min_bars(&self) -> usize {
        self.first_decision_index() + 1
    }

    /// Length of the trailing history window, current bar included.
    fn window(&self) -> usize;

    fn on_bar(&self, ctx: &BarContext<'_>, state: Self::State) -> Step<Self::State>;

    /// Called after the engine fills an order this strategy asked for.
    fn on_fill(&self, _order: &Order, state: Self::State) -> Self::State {
        state
    }

    /// Indicator values recorded alongside each fill.
    fn indicator_snapshot(&self, state: &Self::State) -> IndicatorSnapshot;

    /// Bars skipped because the model could not be fitted.
    fn fit_failures(&self, _state: &Self::State) -> usize {
        0
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
