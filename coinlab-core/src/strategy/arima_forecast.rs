//! ARIMA forecast threshold with a holding-period lockout.
//!
//! Each bar refits ARIMA(p, d, q) on the trailing `lookback` closes and
//! forecasts `look_ahead` steps. The relative gap between that forecast and
//! the current close drives the position:
//!
//! - flat and `predicted_change > threshold` -> enter long
//! - long and `predicted_change < -threshold` -> exit
//!
//! No signal is acted on within `hold_period` calendar days of the last fill.
//! A bar whose fit fails is skipped and counted, never fatal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::params::{self, ParamSpec, StrategyParams};
use super::{Action, BarContext, Step, Strategy};
use crate::domain::{IndicatorSnapshot, Order};
use crate::error::BacktestError;
use crate::indicators::{ArimaModel, ArimaOrder, Indicator};

pub const NAME: &str = "arima";

const SCHEMA: &[ParamSpec] = &[
    ParamSpec::integer("p", 0.0, 5.0, 0.0, "autoregressive order"),
    ParamSpec::integer("d", 0.0, 5.0, 0.0, "differencing order"),
    ParamSpec::integer("q", 0.0, 5.0, 0.0, "moving-average order"),
    ParamSpec::integer("lookback", 1.0, 10_000.0, 30.0, "closes used per fit"),
    ParamSpec::number("threshold", 0.0, 1.0, 0.01, "minimum relative move to act on"),
    ParamSpec::integer("hold_period", 0.0, 1000.0, 5.0, "days locked after a fill"),
    ParamSpec::integer("look_ahead", 1.0, 1000.0, 5.0, "forecast horizon in bars"),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaParams {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub lookback: usize,
    pub threshold: f64,
    pub hold_period: i64,
    pub look_ahead: usize,
}

impl Default for ArimaParams {
    fn default() -> Self {
        Self {
            p: 0,
            d: 0,
            q: 0,
            lookback: 30,
            threshold: 0.01,
            hold_period: 5,
            look_ahead: 5,
        }
    }
}

impl ArimaParams {
    pub fn from_params(map: &StrategyParams) -> Result<Self, BacktestError> {
        let resolved = params::resolve(NAME, SCHEMA, map)?;
        let parsed = Self {
            p: resolved.get_usize("p"),
            d: resolved.get_usize("d"),
            q: resolved.get_usize("q"),
            lookback: resolved.get_usize("lookback"),
            threshold: resolved.get("threshold"),
            hold_period: resolved.get("hold_period") as i64,
            look_ahead: resolved.get_usize("look_ahead"),
        };
        if parsed.lookback <= parsed.d {
            return Err(BacktestError::invalid_param(
                NAME,
                "lookback",
                format!(
                    "lookback {} leaves nothing after {} differences",
                    parsed.lookback, parsed.d
                ),
            ));
        }
        Ok(parsed)
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::from([
            ("p".to_string(), self.p.into()),
            ("d".to_string(), self.d.into()),
            ("q".to_string(), self.q.into()),
            ("lookback".to_string(), self.lookback.into()),
            ("threshold".to_string(), self.threshold.into()),
            ("hold_period".to_string(), self.hold_period.into()),
            ("look_ahead".to_string(), self.look_ahead.into()),
        ])
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        Self::from_params(&self.to_params()).map(|_| ())
    }

    pub fn order(&self) -> ArimaOrder {
        ArimaOrder::new(self.p, self.d, self.q)
    }
}

#[derive(Debug, Clone)]
pub struct ArimaForecast {
    params: ArimaParams,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArimaState {
    pub forecast: Option<f64>,
    pub predicted_change: Option<f64>,
    /// Date of the most recent fill.
    pub last_trade: Option<NaiveDate>,
    pub fit_failures: usize,
}

impl ArimaForecast {
    pub fn new(params: ArimaParams) -> Result<Self, BacktestError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ArimaParams {
        &self.params
    }

    fn locked(&self, state: &ArimaState, today: NaiveDate) -> bool {
        state
            .last_trade
            .is_some_and(|last| (today - last).num_days() < self.params.hold_period)
    }
}

impl Strategy for ArimaForecast {
    type State = ArimaState;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schema() -> &'static [ParamSpec] {
        SCHEMA
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        Vec::new()
    }

    fn first_decision_index(&self) -> usize {
        self.params.lookback - 1
    }

    fn window(&self) -> usize {
        self.params.lookback
    }

    fn on_bar(&self, ctx: &BarContext<'_>, state: ArimaState) -> Step<ArimaState> {
        if ctx.history.len() < self.params.lookback {
            return Step::hold(state);
        }
        let closes: Vec<f64> = ctx.history.iter().map(|bar| bar.close).collect();
        let close = ctx.bar.close;

        let fitted = ArimaModel::fit(&closes, self.params.order())
            .and_then(|model| model.forecast_at(self.params.look_ahead));
        let forecast = match fitted {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    bar = ctx.index,
                    date = %ctx.bar.date(),
                    error = %err,
                    "model fit failed, skipping bar"
                );
                return Step::hold(ArimaState {
                    forecast: None,
                    predicted_change: None,
                    fit_failures: state.fit_failures + 1,
                    ..state
                });
            }
        };

        let predicted_change = (forecast - close) / close;
        let next = ArimaState {
            forecast: Some(forecast),
            predicted_change: Some(predicted_change),
            ..state
        };

        if self.locked(&next, ctx.bar.date()) {
            return Step::hold(next);
        }

        let action = if ctx.position.is_flat() {
            if predicted_change > self.params.threshold {
                Action::enter_long()
            } else {
                Action::NoOp
            }
        } else if predicted_change < -self.params.threshold {
            Action::ExitToFlat
        } else {
            Action::NoOp
        };
        Step::new(action, next)
    }

    fn on_fill(&self, order: &Order, state: ArimaState) -> ArimaState {
        ArimaState {
            last_trade: Some(order.date),
            ..state
        }
    }

    fn indicator_snapshot(&self, state: &ArimaState) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::new();
        if let Some(v) = state.forecast {
            snapshot.insert("forecast".into(), v);
        }
        if let Some(v) = state.predicted_change {
            snapshot.insert("predicted_change".into(), v);
        }
        snapshot
    }

    fn fit_failures(&self, state: &ArimaState) -> usize {
        state.fit_failures
    }
}
