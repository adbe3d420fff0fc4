//! Moving-average crossover: long on a golden cross, flat on a death cross.
//!
//! The crossover is the sign change of `sma_fast - sma_slow` between the
//! previous and the current bar: from <= 0 to > 0 is an up-cross, from >= 0
//! to < 0 a down-cross. On the first bar with a valid slow SMA there is no
//! previous difference and the crossover is 0.

use serde::{Deserialize, Serialize};

use super::params::{self, ParamSpec, StrategyParams};
use super::{round_to, Action, BarContext, Step, Strategy};
use crate::domain::IndicatorSnapshot;
use crate::error::BacktestError;
use crate::indicators::{Indicator, Sma};

pub const NAME: &str = "sma_crossover";

const SCHEMA: &[ParamSpec] = &[
    ParamSpec::integer("fast_period", 1.0, 1000.0, 10.0, "fast SMA period in bars"),
    ParamSpec::integer("slow_period", 1.0, 1000.0, 30.0, "slow SMA period in bars"),
];

/// `fast_period < slow_period` is the usual setup but is not required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaCrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for SmaCrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
        }
    }
}

impl SmaCrossoverParams {
    pub fn from_params(map: &StrategyParams) -> Result<Self, BacktestError> {
        let resolved = params::resolve(NAME, SCHEMA, map)?;
        Ok(Self {
            fast_period: resolved.get_usize("fast_period"),
            slow_period: resolved.get_usize("slow_period"),
        })
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::from([
            ("fast_period".to_string(), self.fast_period.into()),
            ("slow_period".to_string(), self.slow_period.into()),
        ])
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        Self::from_params(&self.to_params()).map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct SmaCrossover {
    params: SmaCrossoverParams,
    fast_key: String,
    slow_key: String,
}

/// Latest readings, carried for the fill snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossoverState {
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub crossover: f64,
}

impl SmaCrossover {
    pub fn new(params: SmaCrossoverParams) -> Result<Self, BacktestError> {
        params.validate()?;
        if params.fast_period >= params.slow_period {
            tracing::debug!(
                fast = params.fast_period,
                slow = params.slow_period,
                "fast period is not shorter than slow period"
            );
        }
        Ok(Self {
            params,
            fast_key: Sma::key(params.fast_period),
            slow_key: Sma::key(params.slow_period),
        })
    }

    pub fn params(&self) -> &SmaCrossoverParams {
        &self.params
    }
}

fn crossover_sign(prev_diff: f64, diff: f64) -> f64 {
    if prev_diff <= 0.0 && diff > 0.0 {
        1.0
    } else if prev_diff >= 0.0 && diff < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl Strategy for SmaCrossover {
    type State = CrossoverState;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schema() -> &'static [ParamSpec] {
        SCHEMA
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(Sma::new(self.params.fast_period)),
            Box::new(Sma::new(self.params.slow_period)),
        ]
    }

    fn first_decision_index(&self) -> usize {
        self.params.fast_period.max(self.params.slow_period) - 1
    }

    fn window(&self) -> usize {
        self.params.fast_period.max(self.params.slow_period) + 1
    }

    fn on_bar(&self, ctx: &BarContext<'_>, _state: CrossoverState) -> Step<CrossoverState> {
        let view = ctx.indicators;
        let (Some(fast), Some(slow)) = (view.current(&self.fast_key), view.current(&self.slow_key))
        else {
            return Step::hold(CrossoverState::default());
        };

        let crossover = match (view.previous(&self.fast_key), view.previous(&self.slow_key)) {
            (Some(prev_fast), Some(prev_slow)) => crossover_sign(prev_fast - prev_slow, fast - slow),
            _ => 0.0,
        };

        let state = CrossoverState {
            sma_fast: Some(fast),
            sma_slow: Some(slow),
            crossover,
        };
        let action = if ctx.position.is_flat() {
            if crossover > 0.0 {
                Action::enter_long()
            } else {
                Action::NoOp
            }
        } else if crossover < 0.0 {
            Action::ExitToFlat
        } else {
            Action::NoOp
        };
        Step::new(action, state)
    }

    fn indicator_snapshot(&self, state: &CrossoverState) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::new();
        if let Some(v) = state.sma_fast {
            snapshot.insert("sma_fast".into(), round_to(v, 2));
        }
        if let Some(v) = state.sma_slow {
            snapshot.insert("sma_slow".into(), round_to(v, 2));
        }
        snapshot
    }
}
