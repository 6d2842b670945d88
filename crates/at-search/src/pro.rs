//! PRO parallel simplex search.
//!
//! A Nelder-Mead variant that evaluates a whole candidate simplex per round
//! so many clients can work in parallel. Two simplexes are maintained: the
//! reference simplex (`base`) holds the last accepted round, the candidate
//! simplex (`test`) is the round currently in flight. Fetches walk the
//! candidate simplex one vertex at a time and the strategy reports busy once
//! every vertex is out; when the whole round has been reported the state
//! machine decides whether to reflect, expand, or shrink next.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use at_types::{
    keys, strategy_error, Config, Error, Flow, FlowStatus, KeyInfo, Perf, Point, Result, Space,
    Trial,
};

use crate::strategy::{seeded_rng, Strategy};
use crate::vertex::{Simplex, Vertex};

const KEYS: &[KeyInfo] = &[
    KeyInfo {
        key: keys::SIMPLEX_SIZE,
        default: None,
        help: "Number of vertices in the search simplex. Clamped below to \
               one more than the search space dimensionality.",
    },
    KeyInfo {
        key: keys::INIT_METHOD,
        default: Some("point"),
        help: "How to construct the initial simplex: random, point, or \
               point_fast.",
    },
    KeyInfo {
        key: keys::INIT_PERCENT,
        default: Some("0.35"),
        help: "Initial simplex size as a fraction of each dimension's range.",
    },
    KeyInfo {
        key: keys::INIT_POINT,
        default: None,
        help: "Center point for the initial simplex. Defaults to the center \
               of the search space.",
    },
    KeyInfo {
        key: keys::REFLECT,
        default: Some("1.0"),
        help: "Multiplicative coefficient for simplex reflection steps.",
    },
    KeyInfo {
        key: keys::EXPAND,
        default: Some("2.0"),
        help: "Multiplicative coefficient for simplex expansion steps.",
    },
    KeyInfo {
        key: keys::CONTRACT,
        default: Some("0.5"),
        help: "Multiplicative coefficient for simplex contraction steps.",
    },
    KeyInfo {
        key: keys::SHRINK,
        default: Some("0.5"),
        help: "Multiplicative coefficient for simplex shrink steps.",
    },
    KeyInfo {
        key: keys::CONVERGE_FV,
        default: Some("0.0001"),
        help: "Convergence test succeeds when the mean squared deviation of \
               vertex performance from the centroid falls below this value.",
    },
    KeyInfo {
        key: keys::CONVERGE_SZ,
        default: None,
        help: "Convergence test succeeds when every vertex lies within this \
               distance of the centroid. Defaults to 0.5% of the search \
               space diagonal.",
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum InitMethod {
    Random,
    Point,
    PointFast,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Init,
    Reflect,
    ExpandOne,
    ExpandAll,
    Shrink,
    Converged,
}

pub struct Pro {
    space: Space,
    rng: StdRng,

    // Search options.
    simplex_size: usize,
    init_method: InitMethod,
    init_percent: f64,
    reflect_coef: f64,
    expand_coef: f64,
    contract_coef: f64,
    shrink_coef: f64,
    fv_tol: f64,
    sz_tol: f64,

    // Search state.
    state: State,
    base: Simplex,
    test: Simplex,
    best_base: usize,
    best_stash: usize,
    next_id: u32,
    send_idx: usize,
    reported: usize,

    best: Point,
    best_perf: f64,
}

impl Pro {
    pub fn new() -> Self {
        Self {
            space: Space::new(),
            rng: StdRng::from_entropy(),
            simplex_size: 0,
            init_method: InitMethod::Point,
            init_percent: 0.35,
            reflect_coef: 1.0,
            expand_coef: 2.0,
            contract_coef: 0.5,
            shrink_coef: 0.5,
            fv_tol: 1e-4,
            sz_tol: 0.0,
            state: State::Init,
            base: Simplex::new(0, 0, 1),
            test: Simplex::new(0, 0, 1),
            best_base: 0,
            best_stash: 0,
            next_id: 1,
            send_idx: 0,
            reported: 0,
            best: Point::empty(),
            best_perf: f64::INFINITY,
        }
    }

    fn configure(&mut self, cfg: &Config) -> Result<()> {
        self.simplex_size = self.space.len() + 1;
        if let Some(v) = cfg.get(keys::SIMPLEX_SIZE) {
            let configured: usize = v.trim().parse().map_err(|_| {
                Error::Config(format!("invalid value for {}", keys::SIMPLEX_SIZE))
            })?;
            self.simplex_size = self.simplex_size.max(configured);
        }

        let method = cfg
            .get(keys::INIT_METHOD)
            .map(|v| v.trim().to_ascii_lowercase());
        self.init_method = match method.as_deref() {
            Some("random") => InitMethod::Random,
            Some("point") | None => InitMethod::Point,
            Some("point_fast") => InitMethod::PointFast,
            Some(other) => {
                return Err(Error::Config(format!(
                    "invalid value '{other}' for {}",
                    keys::INIT_METHOD
                )))
            }
        };

        self.init_percent = cfg.get_real(keys::INIT_PERCENT)?;
        if self.init_percent <= 0.0 || self.init_percent > 1.0 {
            return Err(Error::Config(format!(
                "{} must be in (0.0, 1.0]",
                keys::INIT_PERCENT
            )));
        }

        self.reflect_coef = cfg.get_real(keys::REFLECT)?;
        if self.reflect_coef <= 0.0 {
            return Err(Error::Config(format!("{} must be positive", keys::REFLECT)));
        }

        self.expand_coef = cfg.get_real(keys::EXPAND)?;
        if self.expand_coef <= self.reflect_coef {
            return Err(Error::Config(format!(
                "{} must exceed the reflect coefficient",
                keys::EXPAND
            )));
        }

        self.contract_coef = cfg.get_real(keys::CONTRACT)?;
        if self.contract_coef <= 0.0 || self.contract_coef >= 1.0 {
            return Err(Error::Config(format!(
                "{} must be in (0.0, 1.0)",
                keys::CONTRACT
            )));
        }

        self.shrink_coef = cfg.get_real(keys::SHRINK)?;
        if self.shrink_coef <= 0.0 || self.shrink_coef >= 1.0 {
            return Err(Error::Config(format!(
                "{} must be in (0.0, 1.0)",
                keys::SHRINK
            )));
        }

        self.fv_tol = cfg.get_real(keys::CONVERGE_FV)?;

        self.sz_tol = match cfg.get(keys::CONVERGE_SZ) {
            Some(_) => cfg.get_real(keys::CONVERGE_SZ)?,
            // Default stopping size: 0.5% of the search space diagonal.
            None => self.space.diagonal() * 0.005,
        };
        Ok(())
    }

    fn initial_simplex(&mut self, cfg: &Config) -> Result<Simplex> {
        if self.init_method == InitMethod::Random {
            return Ok(Simplex::random(
                self.simplex_size,
                &self.space,
                1,
                &mut self.rng,
            ));
        }

        let center = match cfg.get(keys::INIT_POINT) {
            Some(text) => {
                let parsed = self.space.parse_point(text)?;
                let aligned = self.space.align(&parsed)?;
                Vertex::from_point(&aligned, 1)
            }
            None => Vertex::center(&self.space, 1),
        };

        Ok(match self.init_method {
            InitMethod::PointFast => Simplex::from_center_fast(
                &center,
                self.init_percent,
                self.simplex_size,
                &self.space,
                1,
                &mut self.rng,
            ),
            _ => Simplex::from_center(
                &center,
                self.init_percent,
                self.simplex_size,
                &self.space,
                1,
                &mut self.rng,
            ),
        })
    }

    fn best_index(&self) -> usize {
        let mut best = 0;
        for (i, v) in self.test.vertices.iter().enumerate().skip(1) {
            if v.perf.obj[0] < self.test.vertices[best].perf.obj[0] {
                best = i;
            }
        }
        best
    }

    fn algorithm(&mut self, best_in: usize, cfg: &mut Config) -> Result<()> {
        // Re-run the state machine until the candidate simplex has at least
        // one vertex inside the search space.
        let mut spins = 0;
        loop {
            if self.state == State::Converged {
                break;
            }

            self.next_state(best_in)?;

            if self.state == State::Reflect {
                self.check_convergence(cfg);
            }

            self.next_simplex();

            if !self.test.out_of_bounds(&self.space) {
                break;
            }
            spins += 1;
            if spins > 1000 {
                return Err(strategy_error!(
                    "simplex search cannot re-enter the space bounds"
                ));
            }
        }
        Ok(())
    }

    fn next_state(&mut self, best_in: usize) -> Result<()> {
        match self.state {
            State::Init | State::Shrink => {
                // Accept the candidate simplex and prepare to reflect.
                self.base = self.test.clone();
                self.best_base = best_in;
                self.state = State::Reflect;
            }

            State::Reflect => {
                if self.test.vertices[best_in].perf.obj[0]
                    < self.base.vertices[self.best_base].perf.obj[0]
                {
                    // Reflected simplex has the best known performance.
                    // Accept it and probe an expansion.
                    self.base = self.test.clone();
                    self.best_stash = best_in;
                    self.state = State::ExpandOne;
                } else {
                    self.state = State::Shrink;
                }
            }

            State::ExpandOne => {
                if self.test.vertices[0].perf.obj[0]
                    < self.base.vertices[self.best_base].perf.obj[0]
                {
                    // The expansion probe improved on everything seen so
                    // far; expand the whole simplex.
                    self.state = State::ExpandAll;
                } else {
                    // Revert to the unexpanded reflected simplex.
                    self.best_base = best_in;
                    self.state = State::Reflect;
                }
            }

            State::ExpandAll => {
                if self.test.vertices[best_in].perf.obj[0]
                    < self.base.vertices[self.best_base].perf.obj[0]
                {
                    self.base = self.test.clone();
                    self.best_base = best_in;
                }
                // Whether or not the expansion held up, reflect next.
                self.state = State::Reflect;
            }

            State::Converged => {
                return Err(strategy_error!("state machine stepped after convergence"))
            }
        }
        Ok(())
    }

    fn next_simplex(&mut self) {
        match self.state {
            State::Init => {
                // Bootstrap by testing the reference simplex itself.
                self.test = self.base.clone();
            }
            State::Reflect => {
                let pivot = self.base.vertices[self.best_base].clone();
                self.test = self.base.transform_all(&pivot, -self.reflect_coef);
            }
            State::ExpandOne => {
                // One vertex probes past the round's best; the rest sit on
                // the reference best.
                let pivot = self.base.vertices[self.best_base].clone();
                self.test.vertices[0] =
                    Vertex::transform(&self.base.vertices[self.best_stash], &pivot, self.expand_coef);
                for v in &mut self.test.vertices[1..] {
                    *v = pivot.clone();
                }
            }
            State::ExpandAll => {
                let pivot = self.base.vertices[self.best_base].clone();
                self.test = self.base.transform_all(&pivot, self.expand_coef);
            }
            State::Shrink => {
                let pivot = self.base.vertices[self.best_base].clone();
                self.test = self.base.transform_all(&pivot, self.shrink_coef);
            }
            State::Converged => {}
        }
    }

    fn check_convergence(&mut self, cfg: &mut Config) {
        if self.base.collapsed(&self.space) {
            return self.converge(cfg);
        }

        let centroid = self.base.centroid(None);

        let fv_err = self
            .base
            .vertices
            .iter()
            .map(|v| {
                let d = v.perf.obj[0] - centroid.perf.obj[0];
                d * d
            })
            .sum::<f64>()
            / self.simplex_size as f64;

        let sz_max = self
            .base
            .vertices
            .iter()
            .map(|v| v.dist(&centroid))
            .fold(0.0, f64::max);

        if fv_err < self.fv_tol && sz_max < self.sz_tol {
            self.converge(cfg);
        }
    }

    fn converge(&mut self, cfg: &mut Config) {
        self.state = State::Converged;
        cfg.set(keys::CONVERGED, "1");
        info!(best = self.best_perf, "simplex search converged");
    }
}

impl Default for Pro {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for Pro {
    fn keys(&self) -> &'static [KeyInfo] {
        KEYS
    }

    fn init(&mut self, space: &Space, cfg: &mut Config) -> Result<()> {
        self.space = space.clone();
        self.rng = seeded_rng(cfg);
        self.configure(cfg)?;

        self.best = Point::empty();
        self.best_perf = f64::INFINITY;

        self.base = self.initial_simplex(cfg)?;
        self.test = Simplex::new(self.simplex_size, space.len(), 1);

        self.state = State::Init;
        self.next_id = 1;
        self.send_idx = 0;
        self.reported = 0;

        cfg.set(keys::CONVERGED, "0");

        self.next_simplex();
        Ok(())
    }

    fn generate(&mut self, flow: &mut Flow, point: &mut Point) -> Result<()> {
        if self.state == State::Converged {
            // Replay the best point under a fresh id.
            *point = self.best.clone();
            point.id = self.next_id;
            self.next_id += 1;
            flow.status = FlowStatus::Accept;
            return Ok(());
        }

        if self.send_idx == self.simplex_size {
            // The whole round is in flight; wait for reports.
            flow.status = FlowStatus::Wait;
            return Ok(());
        }

        self.test.vertices[self.send_idx].id = self.next_id;
        *point = self.test.vertices[self.send_idx].to_point(&self.space);
        self.next_id += 1;
        self.send_idx += 1;

        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn rejected(&mut self, flow: &mut Flow, point: &mut Point, _cfg: &mut Config) -> Result<()> {
        let slot = self
            .test
            .vertices
            .iter()
            .position(|v| v.id == point.id && point.id != 0);

        if let Some(mut hint) = flow.hint.take() {
            hint.id = point.id;
            if let Some(i) = slot {
                self.test.vertices[i].set_from_point(&hint);
            }
            *point = hint;
        } else if let Some(i) = slot {
            // Draw a random replacement for the refused vertex.
            self.test.vertices[i].randomize(&self.space, &mut self.rng);
            *point = self.test.vertices[i].to_point(&self.space);
        } else {
            let id = point.id;
            *point = self.space.random_point(&mut self.rng);
            point.id = id;
        }

        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn analyze(&mut self, trial: &Trial, cfg: &mut Config) -> Result<()> {
        let slot = self
            .test
            .vertices
            .iter()
            .position(|v| v.id == trial.point.id);
        let Some(i) = slot else {
            // Ignore rogue vertex reports.
            debug!(id = trial.point.id, "ignoring rogue report");
            return Ok(());
        };

        let unified = trial.perf.unify();
        self.test.vertices[i].perf = Perf::scalar(unified);
        self.reported += 1;

        if self.reported == self.simplex_size {
            let best_in = self.best_index();
            self.algorithm(best_in, cfg)?;
            self.reported = 0;
            self.send_idx = 0;
        }

        if self.best_perf > unified {
            self.best_perf = unified;
            self.best = trial.point.clone();
        }
        Ok(())
    }

    fn best(&self) -> Point {
        self.best.clone()
    }

    fn name(&self) -> &'static str {
        "pro"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use at_types::Value;

    fn setup(space: &Space, extra: &[(&str, &str)]) -> (Pro, Config) {
        let mut cfg = Config::new();
        cfg.register(KEYS);
        cfg.set(keys::RANDOM_SEED, "17");
        for (k, v) in extra {
            cfg.set(k, v);
        }
        let mut s = Pro::new();
        s.init(space, &mut cfg).unwrap();
        (s, cfg)
    }

    fn fetch(s: &mut Pro) -> Option<Point> {
        let mut flow = Flow::accept();
        let mut point = Point::empty();
        s.generate(&mut flow, &mut point).unwrap();
        match flow.status {
            FlowStatus::Accept => Some(point),
            FlowStatus::Wait => None,
            other => panic!("unexpected flow status {other:?}"),
        }
    }

    fn report(s: &mut Pro, cfg: &mut Config, point: Point, perf: f64) {
        let mut trial = Trial::new(point, 1);
        trial.perf = Perf::scalar(perf);
        s.analyze(&trial, cfg).unwrap();
    }

    /// Drive fetch/report rounds until convergence, returning the number of
    /// fetches used. Performance comes from evaluating `f` on the delivered
    /// (grid-aligned) point.
    fn run<F: Fn(&Point) -> f64>(
        s: &mut Pro,
        cfg: &mut Config,
        space: &Space,
        f: F,
        max_fetches: usize,
    ) -> usize {
        let mut fetches = 0;
        let mut pending: Vec<Point> = Vec::new();
        while cfg.get(keys::CONVERGED) != Some("1") {
            assert!(fetches < max_fetches, "no convergence in {max_fetches} fetches");
            match fetch(s) {
                Some(p) => {
                    assert!(space.contains(&p), "emitted out-of-bounds point {p:?}");
                    fetches += 1;
                    pending.push(p);
                }
                None => {
                    assert!(!pending.is_empty(), "busy with nothing in flight");
                    for p in pending.drain(..) {
                        let perf = f(&p);
                        report(s, cfg, p, perf);
                    }
                }
            }
        }
        fetches
    }

    fn real_term(p: &Point, i: usize) -> f64 {
        match &p.terms[i] {
            Value::Real(v) => *v,
            other => panic!("expected real term, got {other:?}"),
        }
    }

    fn int_term(p: &Point, i: usize) -> i64 {
        match &p.terms[i] {
            Value::Int(v) => *v,
            other => panic!("expected int term, got {other:?}"),
        }
    }

    #[test]
    fn simplex_size_has_a_dimensional_floor() {
        let space = Space::new().add_int("a", 0, 5, 1).add_int("b", 0, 5, 1);
        let (s, _cfg) = setup(&space, &[(keys::SIMPLEX_SIZE, "2")]);
        assert_eq!(s.simplex_size, 3);
        let (s, _cfg) = setup(&space, &[(keys::SIMPLEX_SIZE, "6")]);
        assert_eq!(s.simplex_size, 6);
    }

    #[test]
    fn coefficients_validate_against_their_own_bounds() {
        let space = Space::new().add_real("x", 0.0, 1.0);
        let mut s = Pro::new();

        let mut cfg = Config::new();
        cfg.register(KEYS);
        cfg.set(keys::EXPAND, "0.8"); // not above reflect
        assert!(s.init(&space, &mut cfg).is_err());

        let mut cfg = Config::new();
        cfg.register(KEYS);
        cfg.set(keys::CONTRACT, "1.5");
        assert!(s.init(&space, &mut cfg).is_err());

        let mut cfg = Config::new();
        cfg.register(KEYS);
        cfg.set(keys::SHRINK, "0");
        assert!(s.init(&space, &mut cfg).is_err());

        let mut cfg = Config::new();
        cfg.register(KEYS);
        cfg.set(keys::INIT_PERCENT, "1.2");
        assert!(s.init(&space, &mut cfg).is_err());
    }

    #[test]
    fn busy_exactly_while_the_round_is_in_flight() {
        let space = Space::new().add_real("x", -5.0, 5.0);
        let (mut s, mut cfg) = setup(&space, &[]);

        let a = fetch(&mut s).unwrap();
        let b = fetch(&mut s).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(fetch(&mut s).is_none(), "expected busy");

        report(&mut s, &mut cfg, a, 1.0);
        assert!(fetch(&mut s).is_none(), "still one report short");
        report(&mut s, &mut cfg, b, 2.0);
        assert!(fetch(&mut s).is_some(), "round closed, fetch must proceed");
    }

    #[test]
    fn rogue_reports_are_ignored() {
        let space = Space::new().add_real("x", -5.0, 5.0);
        let (mut s, mut cfg) = setup(&space, &[]);

        let _ = fetch(&mut s).unwrap();
        let rogue = Point::new(999, vec![Value::Real(0.0)]);
        report(&mut s, &mut cfg, rogue, 0.5);
        assert_eq!(s.reported, 0);
        assert_eq!(s.best().id, 0, "rogue reports must not set the best point");
    }

    #[test]
    fn converges_on_a_real_bowl() {
        let space = Space::new().add_real("x", -5.0, 5.0);
        let (mut s, mut cfg) = setup(&space, &[]);

        let fetches = run(&mut s, &mut cfg, &space, |p| real_term(p, 0).powi(2), 100);
        assert!(fetches <= 100);
        let best = s.best();
        assert!(real_term(&best, 0).abs() <= 0.05, "best too far: {best:?}");
    }

    #[test]
    fn finds_the_exact_minimum_on_an_integer_bowl() {
        let space = Space::new().add_int("a", 0, 10, 1).add_int("b", 0, 10, 1);
        let (mut s, mut cfg) = setup(&space, &[(keys::INIT_METHOD, "point_fast")]);

        run(&mut s, &mut cfg, &space, |p| {
            let a = int_term(p, 0) as f64;
            let b = int_term(p, 1) as f64;
            (a - 3.0).powi(2) + (b - 7.0).powi(2)
        }, 2000);

        let best = s.best();
        assert_eq!(int_term(&best, 0), 3);
        assert_eq!(int_term(&best, 1), 7);
        assert_eq!(s.best_perf, 0.0);
    }

    #[test]
    fn best_is_monotone_over_reports() {
        let space = Space::new().add_int("a", 0, 10, 1).add_int("b", 0, 10, 1);
        let (mut s, mut cfg) = setup(&space, &[(keys::INIT_METHOD, "point_fast")]);

        let mut pending: Vec<Point> = Vec::new();
        let mut last_best = f64::INFINITY;
        let mut fetches = 0;
        while cfg.get(keys::CONVERGED) != Some("1") && fetches < 2000 {
            match fetch(&mut s) {
                Some(p) => {
                    fetches += 1;
                    pending.push(p);
                }
                None => {
                    for p in pending.drain(..) {
                        let a = int_term(&p, 0) as f64;
                        let b = int_term(&p, 1) as f64;
                        report(&mut s, &mut cfg, p, (a - 3.0).powi(2) + (b - 7.0).powi(2));
                        assert!(s.best_perf <= last_best, "best regressed");
                        last_best = s.best_perf;
                    }
                }
            }
        }
    }

    #[test]
    fn converged_fetches_replay_the_best_point() {
        let space = Space::new().add_real("x", -5.0, 5.0);
        let (mut s, mut cfg) = setup(&space, &[]);
        run(&mut s, &mut cfg, &space, |p| real_term(p, 0).powi(2), 100);

        let best = s.best();
        let replay = fetch(&mut s).unwrap();
        assert_eq!(replay.terms, best.terms);
        let again = fetch(&mut s).unwrap();
        assert_eq!(again.terms, best.terms);
        assert!(again.id > replay.id, "replayed ids must stay unique");
    }

    #[test]
    fn rejected_hint_replaces_the_pending_vertex() {
        let space = Space::new().add_int("a", 0, 10, 1).add_int("b", 0, 10, 1);
        let (mut s, mut cfg) = setup(&space, &[]);

        let mut point = fetch(&mut s).unwrap();
        let id = point.id;
        let hint = Point::new(0, vec![Value::Int(1), Value::Int(0)]);
        let mut flow = Flow::reject_with(Some(hint));
        s.rejected(&mut flow, &mut point, &mut cfg).unwrap();

        assert_eq!(flow.status, FlowStatus::Accept);
        assert_eq!(point.id, id);
        assert_eq!(point.terms, vec![Value::Int(1), Value::Int(0)]);
        let vertex = s.test.vertices.iter().find(|v| v.id == id).unwrap();
        assert_eq!(vertex.coords, vec![1.0, 0.0]);
    }

    #[test]
    fn rejected_without_hint_draws_a_replacement() {
        let space = Space::new().add_int("a", 0, 10, 1).add_int("b", 0, 10, 1);
        let (mut s, mut cfg) = setup(&space, &[]);

        let mut point = fetch(&mut s).unwrap();
        let id = point.id;
        let mut flow = Flow::reject_with(None);
        s.rejected(&mut flow, &mut point, &mut cfg).unwrap();
        assert_eq!(point.id, id);
        assert!(space.contains(&point));
    }

    #[test]
    fn random_init_stays_in_bounds() {
        let space = Space::new().add_real("x", -2.0, 2.0).add_real("y", 0.0, 4.0);
        let (mut s, _cfg) = setup(&space, &[(keys::INIT_METHOD, "random")]);
        for _ in 0..3 {
            let p = fetch(&mut s).unwrap();
            assert!(space.contains(&p));
        }
    }
}
