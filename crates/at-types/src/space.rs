//! Search space definitions.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::point::Point;
use crate::range::{Dimension, DimensionKind};
use crate::value::{parse_hex_real, Value};

/// The full search space: an ordered list of named dimensions.
///
/// Immutable once a session starts; every point a strategy produces
/// conforms to it term by term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub dimensions: Vec<Dimension>,
}

impl Space {
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    pub fn add_int(mut self, name: impl Into<String>, min: i64, max: i64, step: i64) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            kind: DimensionKind::Int { min, max, step },
        });
        self
    }

    pub fn add_real(mut self, name: impl Into<String>, min: f64, max: f64) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            kind: DimensionKind::Real { min, max },
        });
        self
    }

    pub fn add_enum(mut self, name: impl Into<String>, choices: Vec<String>) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            kind: DimensionKind::Enum { choices },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn dim(&self, i: usize) -> &Dimension {
        &self.dimensions[i]
    }

    /// Check every dimension plus the cross-dimension invariants.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(Error::Config("search space has no dimensions".into()));
        }
        for dim in &self.dimensions {
            dim.validate()?;
        }
        for (i, a) in self.dimensions.iter().enumerate() {
            for b in &self.dimensions[i + 1..] {
                if a.name.eq_ignore_ascii_case(&b.name) {
                    return Err(Error::Config(format!(
                        "duplicate dimension name '{}'",
                        a.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Draw a uniformly random point (id 0).
    pub fn random_point<R: Rng>(&self, rng: &mut R) -> Point {
        Point::new(0, self.dimensions.iter().map(|d| d.random(rng)).collect())
    }

    /// Snap every term of a point to its dimension's nearest legal value.
    /// Keeps the point's id. Alignment is idempotent.
    pub fn align(&self, point: &Point) -> Result<Point> {
        if point.len() != self.len() {
            return Err(Error::SpaceMismatch {
                expected: self.len(),
                got: point.len(),
            });
        }
        let terms = self
            .dimensions
            .iter()
            .zip(&point.terms)
            .map(|(d, v)| d.nearest(v))
            .collect::<Result<Vec<_>>>()?;
        Ok(Point::new(point.id, terms))
    }

    /// Whether every term is a legal value of its dimension.
    pub fn contains(&self, point: &Point) -> bool {
        point.len() == self.len()
            && self
                .dimensions
                .iter()
                .zip(&point.terms)
                .all(|(d, v)| d.contains(v))
    }

    /// Total number of grid points, or `None` when any dimension is real.
    pub fn grid_size(&self) -> Option<u64> {
        let mut total: u64 = 1;
        for dim in &self.dimensions {
            total = total.checked_mul(dim.limit()?)?;
        }
        Some(total)
    }

    /// L2 length of the bounding box diagonal.
    pub fn diagonal(&self) -> f64 {
        self.dimensions
            .iter()
            .map(|d| {
                let span = d.coord_max() - d.coord_min();
                span * span
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Render a point as `( v1, v2, ... )`. Reals use the shortest
    /// round-trip decimal form; enumerated terms render quoted.
    pub fn format_point(&self, point: &Point) -> Result<String> {
        if point.len() != self.len() {
            return Err(Error::SpaceMismatch {
                expected: self.len(),
                got: point.len(),
            });
        }
        let mut out = String::from("(");
        for (i, (dim, term)) in self.dimensions.iter().zip(&point.terms).enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match (term, &dim.kind) {
                (Value::Int(v), _) => out.push_str(&v.to_string()),
                (Value::Real(v), _) => out.push_str(&format!("{v}")),
                (Value::Str(idx), DimensionKind::Enum { choices }) => {
                    let s = choices.get(*idx).ok_or_else(|| {
                        Error::Parse(format!("choice index {idx} invalid for '{}'", dim.name))
                    })?;
                    out.push('"');
                    out.push_str(s);
                    out.push('"');
                }
                _ => {
                    return Err(Error::Parse(format!(
                        "term type does not match dimension '{}'",
                        dim.name
                    )))
                }
            }
        }
        out.push(')');
        Ok(out)
    }

    /// Parse a `( v1, v2, ... )` rendering into a point (id 0) with
    /// type-appropriate literals per dimension. Real terms additionally
    /// accept the hexadecimal `%a` form.
    pub fn parse_point(&self, text: &str) -> Result<Point> {
        let inner = text
            .trim()
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .ok_or_else(|| Error::Parse(format!("point must be parenthesized: '{text}'")))?;

        let fields = split_terms(inner);
        if fields.len() != self.len() {
            return Err(Error::SpaceMismatch {
                expected: self.len(),
                got: fields.len(),
            });
        }

        let mut terms = Vec::with_capacity(self.len());
        for (dim, field) in self.dimensions.iter().zip(fields) {
            let field = field.trim();
            let term = match &dim.kind {
                DimensionKind::Int { .. } => Value::Int(field.parse().map_err(|_| {
                    Error::Parse(format!("bad integer '{field}' for dimension '{}'", dim.name))
                })?),
                DimensionKind::Real { .. } => {
                    let v = if field.starts_with("0x")
                        || field.starts_with("-0x")
                        || field.starts_with("0X")
                        || field.starts_with("-0X")
                    {
                        parse_hex_real(field)?
                    } else {
                        field.parse().map_err(|_| {
                            Error::Parse(format!(
                                "bad real '{field}' for dimension '{}'",
                                dim.name
                            ))
                        })?
                    };
                    Value::Real(v)
                }
                DimensionKind::Enum { choices } => {
                    let name = field.trim_matches('"');
                    let idx = choices.iter().position(|c| c == name).ok_or_else(|| {
                        Error::Parse(format!(
                            "'{name}' is not a choice of dimension '{}'",
                            dim.name
                        ))
                    })?;
                    Value::Str(idx)
                }
            };
            terms.push(term);
        }
        Ok(Point::new(0, terms))
    }
}

impl Default for Space {
    fn default() -> Self {
        Self::new()
    }
}

/// Split on commas that sit outside double quotes.
fn split_terms(inner: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in inner.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                fields.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&inner[start..]);
    fields
}
