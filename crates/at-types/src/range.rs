//! Search-space dimensions.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::value::Value;

/// A single named dimension of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Human-readable variable name (e.g. "tile_size").
    pub name: String,
    /// The kind of value range.
    pub kind: DimensionKind,
}

/// Describes the legal values of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DimensionKind {
    /// Closed integer interval `[min, max]` walked in `step` increments.
    Int { min: i64, max: i64, step: i64 },
    /// Closed real interval `[min, max]`; not indexable.
    Real { min: f64, max: f64 },
    /// Ordered set of string choices; a term stores its choice index.
    Enum { choices: Vec<String> },
}

impl Dimension {
    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            DimensionKind::Int { min, max, step } => {
                if min > max {
                    return Err(Error::Config(format!(
                        "dimension '{}': min {min} exceeds max {max}",
                        self.name
                    )));
                }
                if *step <= 0 {
                    return Err(Error::Config(format!(
                        "dimension '{}': step must be positive",
                        self.name
                    )));
                }
            }
            DimensionKind::Real { min, max } => {
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(Error::Config(format!(
                        "dimension '{}': invalid real bounds [{min}, {max}]",
                        self.name
                    )));
                }
            }
            DimensionKind::Enum { choices } => {
                if choices.is_empty() {
                    return Err(Error::Config(format!(
                        "dimension '{}': enumeration has no choices",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether the dimension has a finite number of legal values.
    pub fn finite(&self) -> bool {
        !matches!(self.kind, DimensionKind::Real { .. })
    }

    /// Number of legal values for a finite dimension.
    pub fn limit(&self) -> Option<u64> {
        match &self.kind {
            DimensionKind::Int { min, max, step } => {
                Some(((max - min) / step) as u64 + 1)
            }
            DimensionKind::Real { .. } => None,
            DimensionKind::Enum { choices } => Some(choices.len() as u64),
        }
    }

    /// Value at position `i` of a finite dimension.
    pub fn value(&self, i: u64) -> Result<Value> {
        match &self.kind {
            DimensionKind::Int { min, step, .. } => Ok(Value::Int(min + step * i as i64)),
            DimensionKind::Real { .. } => Err(Error::Parse(format!(
                "dimension '{}' is not indexable",
                self.name
            ))),
            DimensionKind::Enum { choices } => {
                if (i as usize) < choices.len() {
                    Ok(Value::Str(i as usize))
                } else {
                    Err(Error::Parse(format!(
                        "index {i} out of range for dimension '{}'",
                        self.name
                    )))
                }
            }
        }
    }

    /// Position of a legal value within a finite dimension.
    pub fn index(&self, v: &Value) -> Option<u64> {
        match (&self.kind, v) {
            (DimensionKind::Int { min, max, step }, Value::Int(x)) => {
                if x < min || x > max || (x - min) % step != 0 {
                    None
                } else {
                    Some(((x - min) / step) as u64)
                }
            }
            (DimensionKind::Enum { choices }, Value::Str(i)) => {
                if *i < choices.len() {
                    Some(*i as u64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Draw a uniformly random legal value. Integer and enumerated
    /// dimensions are uniform over their index range.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Value {
        match &self.kind {
            DimensionKind::Int { min, step, .. } => {
                let i = rng.gen_range(0..self.limit().unwrap_or(1));
                Value::Int(min + step * i as i64)
            }
            DimensionKind::Real { min, max } => Value::Real(rng.gen_range(*min..=*max)),
            DimensionKind::Enum { choices } => Value::Str(rng.gen_range(0..choices.len())),
        }
    }

    /// Snap a term to the nearest legal value of this dimension.
    ///
    /// Integers round to the nearest step, reals clamp to the interval, and
    /// enumerated terms must already name a valid choice.
    pub fn nearest(&self, v: &Value) -> Result<Value> {
        match (&self.kind, v) {
            (DimensionKind::Int { min, max, step }, Value::Int(x)) => {
                let clamped = (*x).clamp(*min, *max);
                let i = ((clamped - min) as f64 / *step as f64).round() as i64;
                let i = i.clamp(0, ((max - min) / step) as i64);
                Ok(Value::Int(min + step * i))
            }
            (DimensionKind::Real { min, max }, Value::Real(x)) => {
                Ok(Value::Real(x.clamp(*min, *max)))
            }
            (DimensionKind::Enum { choices }, Value::Str(i)) => {
                if *i < choices.len() {
                    Ok(Value::Str(*i))
                } else {
                    Err(Error::Parse(format!(
                        "choice index {i} invalid for dimension '{}'",
                        self.name
                    )))
                }
            }
            _ => Err(Error::Parse(format!(
                "value type does not match dimension '{}'",
                self.name
            ))),
        }
    }

    /// Whether a term is a legal value of this dimension.
    pub fn contains(&self, v: &Value) -> bool {
        match (&self.kind, v) {
            (DimensionKind::Int { min, max, step }, Value::Int(x)) => {
                x >= min && x <= max && (x - min) % step == 0
            }
            (DimensionKind::Real { min, max }, Value::Real(x)) => x >= min && x <= max,
            (DimensionKind::Enum { choices }, Value::Str(i)) => *i < choices.len(),
            _ => false,
        }
    }

    // Geometric view used by the simplex strategies: every dimension maps
    // onto a closed real coordinate interval.

    pub fn coord_min(&self) -> f64 {
        match &self.kind {
            DimensionKind::Int { min, .. } => *min as f64,
            DimensionKind::Real { min, .. } => *min,
            DimensionKind::Enum { .. } => 0.0,
        }
    }

    pub fn coord_max(&self) -> f64 {
        match &self.kind {
            DimensionKind::Int { min, step, .. } => {
                (*min + step * (self.limit().unwrap_or(1) as i64 - 1)) as f64
            }
            DimensionKind::Real { max, .. } => *max,
            DimensionKind::Enum { choices } => (choices.len() - 1) as f64,
        }
    }

    /// Coordinate of a legal term.
    pub fn coord_of(&self, v: &Value) -> Result<f64> {
        match v {
            Value::Int(x) => Ok(*x as f64),
            Value::Real(x) => Ok(*x),
            Value::Str(i) => Ok(*i as f64),
        }
        .and_then(|c| {
            if self.contains(v) {
                Ok(c)
            } else {
                Err(Error::Parse(format!(
                    "value does not belong to dimension '{}'",
                    self.name
                )))
            }
        })
    }

    /// Nearest legal term for an arbitrary coordinate.
    pub fn value_at_coord(&self, x: f64) -> Value {
        match &self.kind {
            DimensionKind::Int { min, max, step } => {
                let limit = ((max - min) / step) as i64;
                let i = ((x - *min as f64) / *step as f64).round() as i64;
                Value::Int(min + step * i.clamp(0, limit))
            }
            DimensionKind::Real { min, max } => Value::Real(x.clamp(*min, *max)),
            DimensionKind::Enum { choices } => {
                let i = x.round() as i64;
                Value::Str(i.clamp(0, choices.len() as i64 - 1) as usize)
            }
        }
    }
}
