//! Exhaustive enumeration.
//!
//! Starts from an initial position (the space minimum unless `INIT_POINT`
//! says otherwise) and advances the tuning variables like an odometer, least
//! significant dimension first, until every legal point has been visited the
//! configured number of passes. Mainly a baseline for the smarter searches.

use tracing::debug;

use at_types::{keys, Config, Error, Flow, FlowStatus, KeyInfo, Point, Result, Space, Trial, Value};

use crate::strategy::Strategy;

const KEYS: &[KeyInfo] = &[
    KeyInfo {
        key: keys::PASSES,
        default: Some("1"),
        help: "Number of passes through the search space before the search \
               is considered converged.",
    },
    KeyInfo {
        key: keys::INIT_POINT,
        default: None,
        help: "Initial point to begin testing from.",
    },
];

/// Position of one dimension within the sweep. Finite dimensions walk an
/// index; real dimensions walk representable values directly.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Index(u64),
    Real(f64),
}

pub struct Exhaustive {
    space: Space,
    head: Vec<Unit>,
    next: Vec<Unit>,
    wrap: Vec<Unit>,
    next_id: u32,
    remaining_passes: i64,
    final_id: u32,
    outstanding: i64,
    final_received: bool,
    best: Point,
    best_perf: f64,
}

impl Exhaustive {
    pub fn new() -> Self {
        Self {
            space: Space::new(),
            head: Vec::new(),
            next: Vec::new(),
            wrap: Vec::new(),
            next_id: 1,
            remaining_passes: 0,
            final_id: 0,
            outstanding: 0,
            final_received: false,
            best: Point::empty(),
            best_perf: f64::INFINITY,
        }
    }

    fn make_point(&self) -> Result<Point> {
        let mut terms = Vec::with_capacity(self.space.len());
        for (i, unit) in self.next.iter().enumerate() {
            terms.push(match unit {
                Unit::Index(x) => self.space.dim(i).value(*x)?,
                Unit::Real(v) => Value::Real(*v),
            });
        }
        Ok(Point::new(0, terms))
    }

    /// Advance the odometer one position. A full wrap consumes a pass and,
    /// on the last pass, stashes the id just issued as the final id.
    fn increment(&mut self) {
        if self.remaining_passes <= 0 {
            return;
        }

        for i in 0..self.next.len() {
            match (&mut self.next[i], &self.wrap[i]) {
                (Unit::Index(x), Unit::Index(limit)) => {
                    *x += 1;
                    if *x == *limit {
                        *x = 0;
                        continue; // Carry into the next dimension.
                    }
                }
                (Unit::Real(v), Unit::Real(max)) => {
                    let above = next_above(*v);
                    if !(*v < above) || above > *max {
                        *v = self.space.dim(i).coord_min();
                        continue; // Carry into the next dimension.
                    }
                    *v = above;
                }
                _ => unreachable!("unit/wrap kinds agree by construction"),
            }
            return;
        }

        // Every dimension wrapped.
        self.remaining_passes -= 1;
        if self.remaining_passes <= 0 {
            self.final_id = self.next_id;
        }
    }

    fn units_of(&self, point: &Point) -> Result<Vec<Unit>> {
        point
            .terms
            .iter()
            .enumerate()
            .map(|(i, term)| {
                let dim = self.space.dim(i);
                if dim.finite() {
                    dim.index(term).map(Unit::Index).ok_or_else(|| {
                        Error::Config(format!("initial point term {i} is off the grid"))
                    })
                } else {
                    match term {
                        Value::Real(v) => Ok(Unit::Real(*v)),
                        _ => Err(Error::Config(format!(
                            "initial point term {i} does not match its dimension"
                        ))),
                    }
                }
            })
            .collect()
    }
}

impl Default for Exhaustive {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for Exhaustive {
    fn keys(&self) -> &'static [KeyInfo] {
        KEYS
    }

    fn init(&mut self, space: &Space, cfg: &mut Config) -> Result<()> {
        self.space = space.clone();

        self.remaining_passes = cfg.get_int(keys::PASSES)?;
        if self.remaining_passes < 0 {
            return Err(Error::Config(format!("invalid value for {}", keys::PASSES)));
        }

        self.head = match cfg.get(keys::INIT_POINT) {
            Some(text) => {
                let parsed = space.parse_point(text)?;
                let aligned = space.align(&parsed)?;
                self.units_of(&aligned)?
            }
            None => space
                .dimensions
                .iter()
                .map(|d| {
                    if d.finite() {
                        Unit::Index(0)
                    } else {
                        Unit::Real(d.coord_min())
                    }
                })
                .collect(),
        };

        self.wrap = space
            .dimensions
            .iter()
            .map(|d| match d.limit() {
                Some(limit) => Unit::Index(limit),
                None => Unit::Real(d.coord_max()),
            })
            .collect();

        self.next = self.head.clone();
        self.final_id = 0;
        self.outstanding = 0;
        self.final_received = false;
        self.best = Point::empty();
        self.best_perf = f64::INFINITY;

        cfg.set(keys::CONVERGED, "0");
        Ok(())
    }

    fn generate(&mut self, flow: &mut Flow, point: &mut Point) -> Result<()> {
        if self.remaining_passes > 0 {
            *point = self.make_point()?;
            point.id = self.next_id;
            self.increment();
        } else {
            // Sweep complete; replay the best seen so far under a fresh id.
            *point = self.best.clone();
            point.id = self.next_id;
        }
        self.next_id += 1;

        // Track how many pre-final points are still waiting on results.
        if self.final_id == 0 || point.id < self.final_id {
            self.outstanding += 1;
        }

        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn rejected(&mut self, flow: &mut Flow, point: &mut Point, _cfg: &mut Config) -> Result<()> {
        if let Some(mut hint) = flow.hint.take() {
            hint.id = point.id;
            *point = hint;
        } else {
            let id = point.id;
            *point = self.make_point()?;
            point.id = id;
            self.increment();
        }
        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn analyze(&mut self, trial: &Trial, cfg: &mut Config) -> Result<()> {
        let perf = trial.perf.unify();
        if self.best_perf > perf {
            self.best_perf = perf;
            self.best = trial.point.clone();
        }

        if self.final_id != 0 && trial.point.id == self.final_id {
            self.final_received = true;
        }
        if self.final_id == 0 || trial.point.id < self.final_id {
            self.outstanding -= 1;
        }

        if self.final_received && self.outstanding <= 0 {
            debug!(final_id = self.final_id, "exhaustive sweep complete");
            cfg.set(keys::CONVERGED, "1");
        }
        Ok(())
    }

    fn best(&self) -> Point {
        self.best.clone()
    }

    fn name(&self) -> &'static str {
        "exhaustive"
    }
}

/// Next representable double above `v`.
fn next_above(v: f64) -> f64 {
    if v.is_nan() || v == f64::INFINITY {
        return v;
    }
    if v == 0.0 {
        return f64::from_bits(1);
    }
    if v > 0.0 {
        f64::from_bits(v.to_bits() + 1)
    } else {
        f64::from_bits(v.to_bits() - 1)
    }
}
