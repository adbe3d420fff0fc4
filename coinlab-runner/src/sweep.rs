//! Parameter sweeps: many independent backtests over one bar series.
//!
//! Each spec is a whole run on its own thread (rayon). A single run is never
//! split across threads, so every result is identical to a sequential run.

use std::str::FromStr;

use rayon::prelude::*;

use coinlab_core::strategy::{ParamValue, StrategyParams};
use coinlab_core::{run_spec, BacktestError, BacktestResult, PriceBar, StrategyKind, StrategySpec};

/// One sweep point and how it went.
#[derive(Debug, Clone)]
pub struct SweepEntry {
    pub spec: StrategySpec,
    pub outcome: Result<BacktestResult, BacktestError>,
}

impl SweepEntry {
    pub fn profit(&self) -> Option<f64> {
        self.outcome.as_ref().ok().map(|result| result.profit)
    }
}

/// Run every spec over `bars` in parallel.
///
/// Entries come back sorted by profit, best first; failed runs go last in
/// input order.
pub fn run_sweep(bars: &[PriceBar], initial_balance: f64, specs: &[StrategySpec]) -> Vec<SweepEntry> {
    let mut entries: Vec<SweepEntry> = specs
        .par_iter()
        .map(|spec| SweepEntry {
            spec: *spec,
            outcome: run_spec(bars, initial_balance, spec),
        })
        .collect();

    let failed = entries.iter().filter(|e| e.outcome.is_err()).count();
    if failed > 0 {
        tracing::warn!(failed, total = entries.len(), "sweep runs failed");
    }

    // Stable sort keeps input order among ties and among failures.
    entries.sort_by(|a, b| match (a.profit(), b.profit()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    entries
}

/// Values to try for one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRange {
    pub name: String,
    pub values: Vec<ParamValue>,
}

impl FromStr for ParamRange {
    type Err = String;

    /// `name=start..end:step` (inclusive) or `name=a,b,c`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, spec) = s
            .split_once('=')
            .ok_or_else(|| format!("expected name=values, got '{s}'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing parameter name in '{s}'"));
        }

        let values = match spec.split_once("..") {
            Some((start, rest)) => {
                let (end, step) = rest.split_once(':').unwrap_or((rest, "1"));
                let start: ParamValue = start.parse()?;
                let end: ParamValue = end.parse()?;
                let step: ParamValue = step.parse()?;
                expand_range(start, end, step)?
            }
            None => spec
                .split(',')
                .map(str::parse::<ParamValue>)
                .collect::<Result<Vec<_>, _>>()?,
        };
        if values.is_empty() {
            return Err(format!("'{s}' produces no values"));
        }

        Ok(Self {
            name: name.to_string(),
            values,
        })
    }
}

fn expand_range(
    start: ParamValue,
    end: ParamValue,
    step: ParamValue,
) -> Result<Vec<ParamValue>, String> {
    if step.as_f64() <= 0.0 {
        return Err(format!("step {step} must be positive"));
    }
    match (start, end, step) {
        (ParamValue::Int(a), ParamValue::Int(b), ParamValue::Int(s)) => {
            Ok((a..=b).step_by(s as usize).map(ParamValue::Int).collect())
        }
        _ => {
            let (a, b, s) = (start.as_f64(), end.as_f64(), step.as_f64());
            let count = ((b - a) / s + 1e-9).floor();
            if count < 0.0 {
                return Ok(Vec::new());
            }
            Ok((0..=count as usize)
                .map(|i| ParamValue::Float(a + i as f64 * s))
                .collect())
        }
    }
}

/// Cartesian product of parameter ranges for one strategy.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub kind: StrategyKind,
    pub ranges: Vec<ParamRange>,
}

impl ParamGrid {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            ranges: Vec::new(),
        }
    }

    pub fn with_range(mut self, range: ParamRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Returns the total number of points in this grid, valid or not.
    pub fn size(&self) -> usize {
        self.ranges.iter().map(|r| r.values.len()).product()
    }

    /// Every valid spec in the grid.
    ///
    /// Unknown parameter names fail the whole grid. Combinations that break a
    /// cross-parameter rule (e.g. oversold >= overbought) are skipped.
    pub fn specs(&self) -> Result<Vec<StrategySpec>, BacktestError> {
        let name = self.kind.name();
        for range in &self.ranges {
            if !self.kind.schema().iter().any(|p| p.name == range.name) {
                return Err(BacktestError::InvalidParameter {
                    strategy: name.to_string(),
                    param: range.name.clone(),
                    reason: "unknown parameter".into(),
                });
            }
        }

        let mut points = vec![StrategyParams::new()];
        for range in &self.ranges {
            points = points
                .into_iter()
                .flat_map(|point| {
                    range.values.iter().map(move |value| {
                        let mut next = point.clone();
                        next.insert(range.name.clone(), *value);
                        next
                    })
                })
                .collect();
        }

        let mut specs = Vec::with_capacity(points.len());
        let mut skipped = 0usize;
        for point in &points {
            match StrategySpec::from_params(name, point) {
                Ok(spec) => specs.push(spec),
                Err(err) => {
                    tracing::debug!(%err, "skipping grid point");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            tracing::info!(skipped, kept = specs.len(), "grid points skipped");
        }
        Ok(specs)
    }
}
