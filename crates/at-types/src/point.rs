//! Candidate points.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A concrete candidate configuration: one value per space dimension.
///
/// Id `0` is reserved for "no point"; strategies hand out ids from a
/// monotonically increasing counter starting at 1, and ids are unique
/// within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: u32,
    pub terms: Vec<Value>,
}

impl Point {
    pub fn new(id: u32, terms: Vec<Value>) -> Self {
        Self { id, terms }
    }

    /// The "no point" sentinel returned before any candidate exists.
    pub fn empty() -> Self {
        Self {
            id: 0,
            terms: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id == 0
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_point_is_sentinel() {
        let p = Point::empty();
        assert_eq!(p.id, 0);
        assert!(p.is_empty());
        assert_eq!(p.len(), 0);
    }

    #[test]
    fn serde_round_trip() {
        let p = Point::new(7, vec![Value::Int(3), Value::Real(0.5), Value::Str(1)]);
        let json = serde_json::to_string(&p).unwrap();
        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
