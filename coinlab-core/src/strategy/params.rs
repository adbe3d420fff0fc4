//! Parameter maps and per-strategy parameter schemas.
//!
//! A strategy is configured from a name plus a `name -> value` map. Every
//! strategy publishes a schema of [`ParamSpec`]s; [`resolve`] checks the map
//! against it (unknown names, integer-ness, ranges) and fills defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Int(v) => v as f64,
            ParamValue::Float(v) => v,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for ParamValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(ParamValue::Int(v));
        }
        s.parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|_| format!("'{s}' is not a number"))
    }
}

pub type StrategyParams = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Number,
}

/// One entry of a strategy's parameter schema. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn integer(
        name: &'static str,
        min: f64,
        max: f64,
        default: f64,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            min,
            max,
            default,
            description,
        }
    }

    pub const fn number(
        name: &'static str,
        min: f64,
        max: f64,
        default: f64,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Number,
            min,
            max,
            default,
            description,
        }
    }

    /// Check one value against this spec.
    pub fn check(&self, strategy: &str, value: f64) -> Result<f64, BacktestError> {
        if !value.is_finite() {
            return Err(BacktestError::invalid_param(
                strategy,
                self.name,
                format!("{value} is not finite"),
            ));
        }
        if self.kind == ParamKind::Integer && value.fract() != 0.0 {
            return Err(BacktestError::invalid_param(
                strategy,
                self.name,
                format!("{value} is not an integer"),
            ));
        }
        if value < self.min || value > self.max {
            return Err(BacktestError::invalid_param(
                strategy,
                self.name,
                format!("{value} outside [{}, {}]", self.min, self.max),
            ));
        }
        Ok(value)
    }
}

/// A parameter map checked against a schema, with defaults filled in.
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    schema: &'static [ParamSpec],
    values: Vec<f64>,
}

impl ResolvedParams {
    pub fn get(&self, name: &str) -> f64 {
        self.schema
            .iter()
            .position(|spec| spec.name == name)
            .map(|i| self.values[i])
            .unwrap_or(f64::NAN)
    }

    pub fn get_usize(&self, name: &str) -> usize {
        self.get(name) as usize
    }
}

pub fn resolve(
    strategy: &str,
    schema: &'static [ParamSpec],
    params: &StrategyParams,
) -> Result<ResolvedParams, BacktestError> {
    if let Some(unknown) = params
        .keys()
        .find(|key| !schema.iter().any(|spec| spec.name == key.as_str()))
    {
        return Err(BacktestError::invalid_param(
            strategy,
            unknown.as_str(),
            "unknown parameter",
        ));
    }

    let values = schema
        .iter()
        .map(|spec| match params.get(spec.name) {
            Some(value) => spec.check(strategy, value.as_f64()),
            None => Ok(spec.default),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResolvedParams { schema, values })
}

/// The schema's defaults as a parameter map.
pub fn defaults(schema: &[ParamSpec]) -> StrategyParams {
    schema
        .iter()
        .map(|spec| {
            let value = match spec.kind {
                ParamKind::Integer => ParamValue::Int(spec.default as i64),
                ParamKind::Number => ParamValue::Float(spec.default),
            };
            (spec.name.to_string(), value)
        })
        .collect()
}
