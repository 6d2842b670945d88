//! Uniform random sampling.
//!
//! Draws a value for each tuning variable according to its bounds. Never
//! reaches a converged state; like the exhaustive sweep it mostly serves as
//! a baseline for the smarter searches.

use rand::rngs::StdRng;
use rand::SeedableRng;

use at_types::{keys, Config, Flow, FlowStatus, KeyInfo, Point, Result, Space, Trial};

use crate::strategy::{seeded_rng, Strategy};

const KEYS: &[KeyInfo] = &[KeyInfo {
    key: keys::INIT_POINT,
    default: None,
    help: "Initial point to begin testing from.",
}];

pub struct RandomSearch {
    space: Space,
    next: Point,
    best: Point,
    best_perf: f64,
    rng: StdRng,
}

impl RandomSearch {
    pub fn new() -> Self {
        Self {
            space: Space::new(),
            next: Point::new(1, Vec::new()),
            best: Point::empty(),
            best_perf: f64::INFINITY,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for RandomSearch {
    fn keys(&self) -> &'static [KeyInfo] {
        KEYS
    }

    fn init(&mut self, space: &Space, cfg: &mut Config) -> Result<()> {
        self.space = space.clone();
        self.rng = seeded_rng(cfg);

        let id = self.next.id.max(1);
        self.next = match cfg.get(keys::INIT_POINT) {
            Some(text) => {
                let parsed = space.parse_point(text)?;
                space.align(&parsed)?
            }
            None => space.random_point(&mut self.rng),
        };
        self.next.id = id;

        cfg.set(keys::CONVERGED, "0");
        Ok(())
    }

    fn generate(&mut self, flow: &mut Flow, point: &mut Point) -> Result<()> {
        *point = self.next.clone();

        // Prepare a fresh draw for the next call.
        let id = self.next.id + 1;
        self.next = self.space.random_point(&mut self.rng);
        self.next.id = id;

        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn rejected(&mut self, flow: &mut Flow, point: &mut Point, _cfg: &mut Config) -> Result<()> {
        if let Some(mut hint) = flow.hint.take() {
            hint.id = point.id;
            *point = hint;
        } else {
            let id = point.id;
            *point = self.space.random_point(&mut self.rng);
            point.id = id;
        }
        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn analyze(&mut self, trial: &Trial, _cfg: &mut Config) -> Result<()> {
        let perf = trial.perf.unify();
        if self.best_perf > perf {
            self.best_perf = perf;
            self.best = trial.point.clone();
        }
        Ok(())
    }

    fn best(&self) -> Point {
        self.best.clone()
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
