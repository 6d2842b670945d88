//! ANGEL lexicographic multi-objective simplex search.
//!
//! Runs one classic Nelder-Mead search per objective, in priority order.
//! When the search for objective `p` converges, the observed value span of
//! that objective is turned into a threshold (its minimum plus a configured
//! leeway fraction of the span). Later phases penalize candidates that
//! violate the thresholds of already-finished objectives, so the final
//! phase minimizes the last objective subject to soft constraints on all
//! earlier ones.

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
        key: keys::PERF_COUNT,
        default: Some("1"),
        help: "Number of objectives reported for every candidate point.",
    },
    KeyInfo {
        key: keys::INIT_POINT,
        default: None,
        help: "Centroid point used to initialize the search simplex. If this \
               key is left undefined, the simplex is initialized in the \
               center of the search space.",
    },
    KeyInfo {
        key: keys::INIT_RADIUS,
        default: Some("0.50"),
        help: "Size of the initial simplex, as a fraction of the total \
               search space radius.",
    },
    KeyInfo {
        key: keys::REJECT_METHOD,
        default: Some("penalty"),
        help: "How to choose a replacement for rejected points. penalty: \
               apply an infinite penalty to the rejected point and let the \
               algorithm pick the next one. random: replace the rejected \
               point with a random point, deforming the simplex.",
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
        key: keys::FVAL_TOL,
        default: Some("0.0001"),
        help: "Convergence test succeeds when the difference between all \
               vertex performance values falls below this value.",
    },
    KeyInfo {
        key: keys::SIZE_TOL,
        default: Some("0.005"),
        help: "Convergence test succeeds when the simplex radius, measured \
               from centroid to furthest vertex, falls below this fraction \
               of the total search space.",
    },
    KeyInfo {
        key: keys::DIST_TOL,
        default: None,
        help: "Convergence test succeeds when reflection moves the simplex \
               a distance at or below this fraction of the total search \
               space for TOL_CNT consecutive steps. Overrides the default \
               size/fval method.",
    },
    KeyInfo {
        key: keys::TOL_CNT,
        default: Some("3"),
        help: "Number of consecutive short reflection steps before the \
               search is considered converged under DIST_TOL.",
    },
    KeyInfo {
        key: keys::ANGEL_LOOSE,
        default: Some("False"),
        help: "Satisfy as many leeways as possible without favoring higher \
               priority objectives. If false, higher priority objectives \
               are satisfied before lower priority ones may be violated.",
    },
    KeyInfo {
        key: keys::ANGEL_MULT,
        default: Some("1.0"),
        help: "Multiplicative factor for the penalty function.",
    },
    KeyInfo {
        key: keys::ANGEL_ANCHOR,
        default: Some("True"),
        help: "Transfer the best known solution across search phases.",
    },
    KeyInfo {
        key: keys::ANGEL_SAMESIMPLEX,
        default: Some("True"),
        help: "Use the same initial simplex to begin each search phase.",
    },
    KeyInfo {
        key: keys::ANGEL_LEEWAY,
        default: None,
        help: "Comma or whitespace separated list of N-1 leeway values, one \
               per objective except the last, each in [0.0, 1.0]. Specifies \
               how far the search may stray from that objective's minimum.",
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum RejectMethod {
    Penalty,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Init,
    Reflect,
    Expand,
    Contract,
    Shrink,
    Converged,
}

/// Which vertex the strategy hands out next.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NextSel {
    SimplexAt(usize),
    Reflect,
    Expand,
    Contract,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    min: f64,
    max: f64,
}

pub struct Angel {
    space: Space,
    rng: StdRng,

    // Search options.
    perf_n: usize,
    init_radius: f64,
    reject_method: RejectMethod,
    reflect_val: f64,
    expand_val: f64,
    contract_val: f64,
    shrink_val: f64,
    fval_tol: f64,
    size_tol: f64,
    dist_tol: Option<f64>,
    tol_cnt: u32,
    leeway: Vec<f64>,
    mult: f64,
    anchor: bool,
    loose: bool,
    samesimplex: bool,

    // Search state.
    state: State,
    simplex: Simplex,
    init_simplex: Simplex,
    centroid: Vertex,
    reflect_v: Vertex,
    expand_v: Vertex,
    contract_v: Vertex,
    next_sel: NextSel,
    index_best: usize,
    index_worst: usize,
    index_curr: i64,
    next_id: u32,
    move_len: f64,
    space_size: f64,
    flat_cnt: u32,
    tol_streak: u32,

    phase: i32,
    thresh: Vec<f64>,
    span: Vec<Span>,

    best: Point,
    best_perf: Perf,
}

impl Angel {
    pub fn new() -> Self {
        Self {
            space: Space::new(),
            rng: StdRng::from_entropy(),
            perf_n: 1,
            init_radius: 0.5,
            reject_method: RejectMethod::Penalty,
            reflect_val: 1.0,
            expand_val: 2.0,
            contract_val: 0.5,
            shrink_val: 0.5,
            fval_tol: 1e-4,
            size_tol: 0.0,
            dist_tol: None,
            tol_cnt: 3,
            leeway: Vec::new(),
            mult: 1.0,
            anchor: true,
            loose: false,
            samesimplex: true,
            state: State::Init,
            simplex: Simplex::new(0, 0, 1),
            init_simplex: Simplex::new(0, 0, 1),
            centroid: Vertex::new(0, 1),
            reflect_v: Vertex::new(0, 1),
            expand_v: Vertex::new(0, 1),
            contract_v: Vertex::new(0, 1),
            next_sel: NextSel::SimplexAt(0),
            index_best: 0,
            index_worst: 0,
            index_curr: 0,
            next_id: 1,
            move_len: f64::INFINITY,
            space_size: 0.0,
            flat_cnt: 0,
            tol_streak: 0,
            phase: -1,
            thresh: Vec::new(),
            span: Vec::new(),
            best: Point::empty(),
            best_perf: Perf::reset_with(1),
        }
    }

    fn ph(&self) -> usize {
        self.phase as usize
    }

    fn next(&self) -> &Vertex {
        match self.next_sel {
            NextSel::SimplexAt(i) => &self.simplex.vertices[i],
            NextSel::Reflect => &self.reflect_v,
            NextSel::Expand => &self.expand_v,
            NextSel::Contract => &self.contract_v,
        }
    }

    fn next_mut(&mut self) -> &mut Vertex {
        match self.next_sel {
            NextSel::SimplexAt(i) => &mut self.simplex.vertices[i],
            NextSel::Reflect => &mut self.reflect_v,
            NextSel::Expand => &mut self.expand_v,
            NextSel::Contract => &mut self.contract_v,
        }
    }

    fn configure(&mut self, cfg: &Config) -> Result<()> {
        self.loose = cfg.get_bool(keys::ANGEL_LOOSE);
        self.anchor = cfg.get_bool(keys::ANGEL_ANCHOR);
        self.samesimplex = cfg.get_bool(keys::ANGEL_SAMESIMPLEX);
        self.mult = cfg.get_real(keys::ANGEL_MULT)?;

        self.init_radius = cfg.get_real(keys::INIT_RADIUS)?;
        if self.init_radius <= 0.0 || self.init_radius > 1.0 {
            return Err(Error::Config(format!(
                "{} must be in (0.0, 1.0]",
                keys::INIT_RADIUS
            )));
        }

        let method = cfg
            .get(keys::REJECT_METHOD)
            .map(|v| v.trim().to_ascii_lowercase());
        self.reject_method = match method.as_deref() {
            Some("penalty") | None => RejectMethod::Penalty,
            Some("random") => RejectMethod::Random,
            Some(other) => {
                return Err(Error::Config(format!(
                    "invalid value '{other}' for {}",
                    keys::REJECT_METHOD
                )))
            }
        };

        self.reflect_val = cfg.get_real(keys::REFLECT)?;
        if self.reflect_val <= 0.0 {
            return Err(Error::Config(format!("{} must be positive", keys::REFLECT)));
        }

        self.expand_val = cfg.get_real(keys::EXPAND)?;
        if self.expand_val <= self.reflect_val {
            return Err(Error::Config(format!(
                "{} must be greater than the reflect coefficient",
                keys::EXPAND
            )));
        }

        self.contract_val = cfg.get_real(keys::CONTRACT)?;
        if self.contract_val <= 0.0 || self.contract_val >= 1.0 {
            return Err(Error::Config(format!(
                "{} must be in (0.0, 1.0)",
                keys::CONTRACT
            )));
        }

        self.shrink_val = cfg.get_real(keys::SHRINK)?;
        if self.shrink_val <= 0.0 || self.shrink_val >= 1.0 {
            return Err(Error::Config(format!(
                "{} must be in (0.0, 1.0)",
                keys::SHRINK
            )));
        }

        let perf_n = cfg.get_int(keys::PERF_COUNT)?;
        if perf_n < 1 {
            return Err(Error::Config(format!(
                "invalid value for {}",
                keys::PERF_COUNT
            )));
        }
        self.perf_n = perf_n as usize;

        self.space_size = self.space.diagonal();

        self.dist_tol = match cfg.get(keys::DIST_TOL) {
            Some(_) => {
                let v = cfg.get_real(keys::DIST_TOL)?;
                if v <= 0.0 || v >= 1.0 {
                    return Err(Error::Config(format!(
                        "{} must be in (0.0, 1.0)",
                        keys::DIST_TOL
                    )));
                }
                let cnt = cfg.get_int(keys::TOL_CNT)?;
                if cnt < 1 {
                    return Err(Error::Config(format!(
                        "{} must be greater than zero",
                        keys::TOL_CNT
                    )));
                }
                self.tol_cnt = cnt as u32;
                Some(v)
            }
            None => {
                self.fval_tol = cfg.get_real(keys::FVAL_TOL)?;
                let v = cfg.get_real(keys::SIZE_TOL)?;
                if v <= 0.0 || v >= 1.0 {
                    return Err(Error::Config(format!(
                        "{} must be in (0.0, 1.0)",
                        keys::SIZE_TOL
                    )));
                }
                self.size_tol = v * self.space_size;
                None
            }
        };

        self.leeway = if self.perf_n > 1 {
            if cfg.get(keys::ANGEL_LEEWAY).is_none() {
                return Err(Error::Config(format!(
                    "{} must be defined",
                    keys::ANGEL_LEEWAY
                )));
            }
            if cfg.array_len(keys::ANGEL_LEEWAY) != self.perf_n - 1 {
                return Err(Error::Config(
                    "incorrect number of leeway values provided".into(),
                ));
            }
            (0..self.perf_n - 1)
                .map(|i| {
                    let v = cfg.array_real(keys::ANGEL_LEEWAY, i)?;
                    if !(0.0..=1.0).contains(&v) {
                        return Err(Error::Config(format!(
                            "{} values must be in [0.0, 1.0]",
                            keys::ANGEL_LEEWAY
                        )));
                    }
                    Ok(v)
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        self.span = vec![
            Span {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            };
            self.perf_n
        ];
        self.thresh = vec![0.0; self.perf_n];
        Ok(())
    }

    fn make_initial_simplex(&mut self, cfg: &Config) -> Result<()> {
        let center = match cfg.get(keys::INIT_POINT) {
            Some(text) => {
                let parsed = self.space.parse_point(text)?;
                let aligned = self.space.align(&parsed)?;
                Vertex::from_point(&aligned, self.perf_n)
            }
            None => Vertex::center(&self.space, self.perf_n),
        };
        self.init_simplex = Simplex::from_center(
            &center,
            self.init_radius,
            self.space.len() + 1,
            &self.space,
            self.perf_n,
            &mut self.rng,
        );
        Ok(())
    }

    fn update_centroid(&mut self) {
        self.index_best = 0;
        self.index_worst = 0;
        let ph = self.ph();
        for (i, v) in self.simplex.vertices.iter().enumerate().skip(1) {
            if v.perf.obj[ph] < self.simplex.vertices[self.index_best].perf.obj[ph] {
                self.index_best = i;
            }
            if v.perf.obj[ph] > self.simplex.vertices[self.index_worst].perf.obj[ph] {
                self.index_worst = i;
            }
        }
        self.centroid = self.simplex.centroid(Some(self.index_worst));
    }

    fn algorithm(&mut self, cfg: &mut Config) -> Result<()> {
        let mut spins = 0;
        loop {
            if self.state == State::Converged {
                break;
            }

            self.state_transition()?;

            if self.state == State::Reflect {
                self.update_centroid();
                self.check_convergence(cfg)?;
            }

            self.next_vertex();

            if self.next().in_bounds(&self.space) {
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

    fn state_transition(&mut self) -> Result<()> {
        let ph = self.ph();
        match self.state {
            State::Init | State::Shrink => {
                // Walking the simplex one vertex at a time.
                self.index_curr += 1;
                if self.index_curr == self.space.len() as i64 + 1 {
                    self.update_centroid();
                    self.state = State::Reflect;
                    self.index_curr = 0;
                }
            }

            State::Reflect => {
                let best = self.simplex.vertices[self.index_best].perf.obj[ph];
                let worst = self.simplex.vertices[self.index_worst].perf.obj[ph];
                if self.reflect_v.perf.obj[ph] < best {
                    // Better than every simplex point. Attempt expansion.
                    self.state = State::Expand;
                } else if self.reflect_v.perf.obj[ph] < worst {
                    // Better than the worst point only; swap it in and
                    // reflect again.
                    self.simplex.vertices[self.index_worst] = self.reflect_v.clone();
                    self.update_centroid();
                } else {
                    self.state = State::Contract;
                }
            }

            State::Expand => {
                let best = self.simplex.vertices[self.index_best].perf.obj[ph];
                if self.expand_v.perf.obj[ph] < best {
                    self.simplex.vertices[self.index_worst] = self.expand_v.clone();
                } else {
                    self.simplex.vertices[self.index_worst] = self.reflect_v.clone();
                }
                self.update_centroid();
                self.state = State::Reflect;
            }

            State::Contract => {
                let worst = self.simplex.vertices[self.index_worst].perf.obj[ph];
                if self.contract_v.perf.obj[ph] < worst {
                    self.simplex.vertices[self.index_worst] = self.contract_v.clone();
                    self.update_centroid();
                    self.state = State::Reflect;
                } else {
                    // Nothing worked; shrink the whole simplex.
                    self.index_curr = -1;
                    self.state = State::Shrink;
                }
            }

            State::Converged => {
                return Err(strategy_error!("state machine stepped after convergence"))
            }
        }
        Ok(())
    }

    fn next_vertex(&mut self) {
        match self.state {
            State::Init => {
                self.next_sel = NextSel::SimplexAt(self.index_curr as usize);
            }

            State::Reflect => {
                let worst = self.simplex.vertices[self.index_worst].clone();
                self.reflect_v =
                    Vertex::transform(&self.centroid, &worst, 1.0 + self.reflect_val);
                self.move_len = worst.dist(&self.reflect_v) / self.space_size;
                self.next_sel = NextSel::Reflect;
            }

            State::Expand => {
                let worst = self.simplex.vertices[self.index_worst].clone();
                self.expand_v = Vertex::transform(&self.centroid, &worst, 1.0 + self.expand_val);
                self.next_sel = NextSel::Expand;
            }

            State::Contract => {
                let worst = self.simplex.vertices[self.index_worst].clone();
                self.contract_v =
                    Vertex::transform(&worst, &self.centroid, 1.0 - self.contract_val);
                self.next_sel = NextSel::Contract;
            }

            State::Shrink => {
                if self.index_curr == -1 {
                    // Pull the whole simplex toward the best vertex, then
                    // walk it for re-evaluation.
                    let best = self.simplex.vertices[self.index_best].clone();
                    self.simplex = self.simplex.transform_all(&best, 1.0 - self.shrink_val);
                    self.index_curr = 0;
                }
                self.next_sel = NextSel::SimplexAt(self.index_curr as usize);
            }

            State::Converged => {
                self.next_sel = NextSel::SimplexAt(self.index_best);
            }
        }
        self.next_mut().perf.reset();
    }

    fn check_convergence(&mut self, cfg: &mut Config) -> Result<()> {
        let ph = self.ph();

        // All simplex objective values identical for three straight moves.
        let first = self.simplex.vertices[0].perf.obj[ph];
        let flat = self
            .simplex
            .vertices
            .iter()
            .all(|v| v.perf.obj[ph] == first);
        if flat {
            self.flat_cnt += 1;
            if self.flat_cnt >= 3 {
                self.flat_cnt = 0;
                return self.phase_converged(cfg);
            }
        } else {
            self.flat_cnt = 0;
        }

        if self.simplex.collapsed(&self.space) {
            return self.phase_converged(cfg);
        }

        match self.dist_tol {
            Some(tol) => {
                if self.move_len < tol {
                    self.tol_streak += 1;
                    if self.tol_streak >= self.tol_cnt {
                        self.tol_streak = 0;
                        return self.phase_converged(cfg);
                    }
                } else {
                    self.tol_streak = 0;
                }
            }
            None => {
                let base_val = self.centroid.perf.obj[ph];
                let fval_err = self
                    .simplex
                    .vertices
                    .iter()
                    .map(|v| {
                        let d = v.perf.obj[ph] - base_val;
                        d * d
                    })
                    .sum::<f64>()
                    / self.simplex.len() as f64;

                let size_max = self
                    .simplex
                    .vertices
                    .iter()
                    .map(|v| v.dist(&self.centroid))
                    .fold(0.0, f64::max);

                if fval_err < self.fval_tol && size_max < self.size_tol {
                    return self.phase_converged(cfg);
                }
            }
        }
        Ok(())
    }

    fn phase_converged(&mut self, cfg: &mut Config) -> Result<()> {
        if self.phase == self.perf_n as i32 - 1 {
            self.state = State::Converged;
            cfg.set(keys::CONVERGED, "1");
            info!(phase = self.phase, "search converged");
            Ok(())
        } else {
            self.increment_phase(cfg)
        }
    }

    fn increment_phase(&mut self, cfg: &mut Config) -> Result<()> {
        if self.phase >= 0 {
            // Freeze the finished objective into a threshold.
            let ph = self.ph();
            let span = self.span[ph];
            self.thresh[ph] = span.min + self.leeway[ph] * (span.max - span.min);
            debug!(phase = ph, thresh = self.thresh[ph], "phase threshold fixed");
        }
        self.phase += 1;
        cfg.set(keys::ANGEL_PHASE, &self.phase.to_string());

        // Preserve the finished phase's best vertex; the centroid slot is
        // free until the next reflection.
        self.centroid = self.simplex.vertices[self.index_best].clone();

        if !self.samesimplex {
            self.make_initial_simplex(cfg)?;
        }
        self.simplex = self.init_simplex.clone();

        if self.best.id > 0 && self.anchor {
            let mut idx = 0;
            let mut min_dist = f64::INFINITY;
            for (i, v) in self.simplex.vertices.iter().enumerate() {
                let d = self.centroid.dist(v);
                if d < min_dist {
                    min_dist = d;
                    idx = i;
                }
            }
            self.simplex.vertices[idx] = self.centroid.clone();
        }

        self.best_perf.reset();
        self.best.id = 0;

        self.state = State::Init;
        self.index_curr = 0;
        Ok(())
    }
}

impl Default for Angel {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for Angel {
    fn keys(&self) -> &'static [KeyInfo] {
        KEYS
    }

    fn init(&mut self, space: &Space, cfg: &mut Config) -> Result<()> {
        self.space = space.clone();
        self.rng = seeded_rng(cfg);
        self.configure(cfg)?;

        let dims = space.len();
        self.simplex = Simplex::new(dims + 1, dims, self.perf_n);
        self.centroid = Vertex::new(dims, self.perf_n);
        self.reflect_v = Vertex::new(dims, self.perf_n);
        self.expand_v = Vertex::new(dims, self.perf_n);
        self.contract_v = Vertex::new(dims, self.perf_n);
        self.best = Point::empty();
        self.best_perf = Perf::reset_with(self.perf_n);
        self.move_len = f64::INFINITY;
        self.flat_cnt = 0;
        self.tol_streak = 0;
        self.index_best = 0;
        self.index_worst = 0;

        self.make_initial_simplex(cfg)?;

        cfg.set(keys::CONVERGED, "0");

        self.next_id = 1;
        self.phase = -1;
        self.increment_phase(cfg)?;
        self.next_vertex();
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

        if self.next().id == self.next_id {
            // The current vertex is already in flight.
            flow.status = FlowStatus::Wait;
            return Ok(());
        }

        self.next_mut().id = self.next_id;
        *point = self.next().to_point(&self.space);

        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn rejected(&mut self, flow: &mut Flow, point: &mut Point, cfg: &mut Config) -> Result<()> {
        if let Some(mut hint) = flow.hint.take() {
            // Fold the hint into the pending vertex and echo it out.
            hint.id = point.id;
            self.next_mut().set_from_point(&hint);
            *point = hint;
        } else {
            match self.reject_method {
                RejectMethod::Penalty => {
                    // An infinite penalty lets the algorithm move on.
                    self.next_mut().perf.reset();
                    self.algorithm(cfg)?;
                }
                RejectMethod::Random => match self.next_sel {
                    NextSel::SimplexAt(i) => {
                        self.simplex.vertices[i].randomize(&self.space, &mut self.rng)
                    }
                    NextSel::Reflect => self.reflect_v.randomize(&self.space, &mut self.rng),
                    NextSel::Expand => self.expand_v.randomize(&self.space, &mut self.rng),
                    NextSel::Contract => self.contract_v.randomize(&self.space, &mut self.rng),
                },
            }
            self.next_mut().id = self.next_id;
            *point = self.next().to_point(&self.space);
        }

        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn analyze(&mut self, trial: &Trial, cfg: &mut Config) -> Result<()> {
        if self.state == State::Converged {
            return Ok(());
        }
        if trial.point.id != self.next().id {
            return Err(strategy_error!(
                "unexpected report for point {}",
                trial.point.id
            ));
        }
        if trial.perf.len() != self.perf_n {
            return Err(Error::SpaceMismatch {
                expected: self.perf_n,
                got: trial.perf.len(),
            });
        }

        self.next_mut().perf = trial.perf.clone();

        // Track the observed value range of every objective.
        for (i, span) in self.span.iter_mut().enumerate() {
            let obj = trial.perf.obj[i];
            if span.min > obj {
                span.min = obj;
            }
            if span.max < obj && obj < f64::INFINITY {
                span.max = obj;
            }
        }

        // Penalize violations of already-frozen thresholds. Higher priority
        // objectives cost exponentially more unless the loose policy is on.
        let ph = self.ph();
        let mut penalty = 0.0;
        let mut penalty_base = 1.0;
        for i in (0..ph).rev() {
            let obj = self.next().perf.obj[i];
            if obj > self.thresh[i] {
                if !self.loose {
                    penalty += penalty_base;
                }
                let denom = self.span[i].max - self.thresh[i];
                let fraction = if denom > 0.0 {
                    (obj - self.thresh[i]) / denom
                } else {
                    1.0
                };
                penalty += 1.0 / (1.0 - fraction.ln());
            }
            penalty_base *= 2.0;
        }
        if penalty > 0.0 {
            if self.loose {
                penalty += 1.0;
            }
            let span = self.span[ph].max - self.span[ph].min;
            self.next_mut().perf.obj[ph] += penalty * span * self.mult;
        }

        if self.best_perf.obj[ph] > self.next().perf.obj[ph] {
            self.best_perf = self.next().perf.clone();
            self.best = trial.point.clone();
        }

        self.algorithm(cfg)?;

        if self.state != State::Converged {
            self.next_id += 1;
        }
        Ok(())
    }

    fn best(&self) -> Point {
        self.best.clone()
    }

    fn name(&self) -> &'static str {
        "angel"
    }
}
