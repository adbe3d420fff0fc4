//! RSI threshold: buy oversold, close overbought.

use serde::{Deserialize, Serialize};

use super::params::{self, ParamSpec, StrategyParams};
use super::{round_to, Action, BarContext, Step, Strategy};
use crate::domain::IndicatorSnapshot;
use crate::error::BacktestError;
use crate::indicators::{Indicator, Rsi};

pub const NAME: &str = "rsi";

const SCHEMA: &[ParamSpec] = &[
    ParamSpec::integer("rsi_period", 1.0, 1000.0, 14.0, "Wilder smoothing period"),
    ParamSpec::number("overbought", 0.0, 100.0, 70.0, "close when RSI >= this"),
    ParamSpec::number("oversold", 0.0, 100.0, 30.0, "buy when RSI <= this"),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    pub rsi_period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl RsiParams {
    pub fn from_params(map: &StrategyParams) -> Result<Self, BacktestError> {
        let resolved = params::resolve(NAME, SCHEMA, map)?;
        let parsed = Self {
            rsi_period: resolved.get_usize("rsi_period"),
            overbought: resolved.get("overbought"),
            oversold: resolved.get("oversold"),
        };
        if parsed.oversold >= parsed.overbought {
            return Err(BacktestError::invalid_param(
                NAME,
                "oversold",
                format!(
                    "oversold {} must be below overbought {}",
                    parsed.oversold, parsed.overbought
                ),
            ));
        }
        Ok(parsed)
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::from([
            ("rsi_period".to_string(), self.rsi_period.into()),
            ("overbought".to_string(), self.overbought.into()),
            ("oversold".to_string(), self.oversold.into()),
        ])
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        Self::from_params(&self.to_params()).map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct RsiThreshold {
    params: RsiParams,
    key: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RsiState {
    pub rsi: Option<f64>,
}

impl RsiThreshold {
    pub fn new(params: RsiParams) -> Result<Self, BacktestError> {
        params.validate()?;
        Ok(Self {
            params,
            key: Rsi::key(params.rsi_period),
        })
    }

    pub fn params(&self) -> &RsiParams {
        &self.params
    }
}

impl Strategy for RsiThreshold {
    type State = RsiState;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schema() -> &'static [ParamSpec] {
        SCHEMA
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Rsi::new(self.params.rsi_period))]
    }

    fn first_decision_index(&self) -> usize {
        self.params.rsi_period
    }

    fn window(&self) -> usize {
        self.params.rsi_period + 1
    }

    fn on_bar(&self, ctx: &BarContext<'_>, _state: RsiState) -> Step<RsiState> {
        let Some(rsi) = ctx.indicators.current(&self.key) else {
            return Step::hold(RsiState::default());
        };

        let action = if ctx.position.is_flat() {
            if rsi <= self.params.oversold {
                Action::enter_long()
            } else {
                Action::NoOp
            }
        } else if rsi >= self.params.overbought {
            Action::ExitToFlat
        } else {
            Action::NoOp
        };
        Step::new(action, RsiState { rsi: Some(rsi) })
    }

    fn indicator_snapshot(&self, state: &RsiState) -> IndicatorSnapshot {
        state
            .rsi
            .map(|v| IndicatorSnapshot::from([("rsi".to_string(), round_to(v, 2))]))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::strategy::test_support::drive;

    fn strategy(period: usize) -> RsiThreshold {
        RsiThreshold::new(RsiParams {
            rsi_period: period,
            ..RsiParams::default()
        })
        .unwrap()
    }

    #[test]
    fn buys_oversold_then_closes_overbought() {
        // RSI(3): 66.7, 44.4, 29.6 (bar 5), 19.8, 46.5, 64.3, 76.2 (bar 9)
        let bars = make_bars(&[100.0, 101.0, 102.0, 101.0, 100.0, 99.0, 98.0, 99.0, 100.0, 101.0]);
        let actions = drive(&strategy(3), &bars);
        assert_eq!(actions, vec![(5, Action::enter_long()), (9, Action::ExitToFlat)]);
    }

    #[test]
    fn stays_flat_while_rsi_is_neutral() {
        let bars = make_bars(&[100.0, 101.0, 100.0, 101.0, 100.0, 101.0, 100.0]);
        assert!(drive(&strategy(3), &bars).is_empty());
    }

    #[test]
    fn first_decision_needs_period_changes() {
        assert_eq!(strategy(14).first_decision_index(), 14);
        assert_eq!(strategy(14).min_bars(), 15);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = RsiThreshold::new(RsiParams {
            rsi_period: 14,
            overbought: 30.0,
            oversold: 70.0,
        })
        .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter { ref param, .. } if param == "oversold"));
    }

    #[test]
    fn bound_above_100_is_rejected() {
        let params = RsiParams {
            overbought: 120.0,
            ..RsiParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn snapshot_is_rounded() {
        let snapshot = strategy(3).indicator_snapshot(&RsiState { rsi: Some(29.62963) });
        assert_eq!(snapshot["rsi"], 29.63);
        assert!(strategy(3).indicator_snapshot(&RsiState::default()).is_empty());
    }
}
