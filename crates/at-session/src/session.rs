//! The session core.
//!
//! Owns the configuration, search space, strategy, processing pipeline, and
//! the set of outstanding trials. Everything runs cooperatively on the
//! caller's thread: requests are handled one at a time and no strategy or
//! stage hook is ever re-entered. Parked trials (a stage returned `Wait`)
//! sit in an explicit queue keyed by stage index and are re-offered to
//! their stage on every request dispatch.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info};
use uuid::Uuid;

use at_search::{build_strategy, Strategy};
use at_types::{
    keys, Config, Error, Flow, FlowStatus, KeyInfo, Perf, Point, Result, Space, Trial, TrialStatus,
};

use crate::pipeline::Stage;
use crate::protocol::{Reply, Request};

const CORE_KEYS: &[KeyInfo] = &[
    KeyInfo {
        key: keys::STRATEGY,
        default: Some("pro"),
        help: "Search strategy driving this session.",
    },
    KeyInfo {
        key: keys::LAYERS,
        default: None,
        help: "Ordered list of processing stages candidate points flow \
               through.",
    },
    KeyInfo {
        key: keys::CONVERGED,
        default: Some("0"),
        help: "Set to 1 by the strategy once the search has converged.",
    },
    KeyInfo {
        key: keys::RANDOM_SEED,
        default: None,
        help: "Seed for the pseudo-random number generator. Defaults to \
               entropy.",
    },
    KeyInfo {
        key: keys::PERF_COUNT,
        default: Some("1"),
        help: "Number of objectives in every performance report.",
    },
    KeyInfo {
        key: keys::CLIENT_COUNT,
        default: Some("0"),
        help: "Number of clients currently in the session.",
    },
];

/// How many pipeline rejections or strategy retries one fetch tolerates
/// before the session calls the stage faulty.
const MAX_REPLACEMENTS: usize = 100;

enum Parked {
    Forward { point: Point, stage: usize },
    Reverse { trial: Trial, stage: usize },
}

enum ForwardOutcome {
    Deliver(Point),
    Parked,
    Retry,
}

/// Result of a fetch request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// No candidate is available right now; try again later.
    Busy,
    /// A candidate, plus the current best when it is newer than the
    /// client's `best_prev_id`.
    Point { point: Point, best: Option<Point> },
}

pub struct Session {
    id: Uuid,
    cfg: Config,
    space: Space,
    strategy: Box<dyn Strategy>,
    stages: Vec<Box<dyn Stage>>,
    trials: HashMap<u32, Trial>,
    parked: VecDeque<Parked>,
    deliverable: VecDeque<Point>,
    clients: Vec<String>,
    perf_len: usize,
}

impl Session {
    /// Assemble a session from explicit parts.
    pub fn new(
        space: Space,
        mut cfg: Config,
        strategy: Box<dyn Strategy>,
        stages: Vec<Box<dyn Stage>>,
    ) -> Result<Self> {
        space.validate()?;

        cfg.register(CORE_KEYS);
        cfg.register(strategy.keys());
        for stage in &stages {
            cfg.register(stage.keys());
        }

        let perf_len = cfg.get_int(keys::PERF_COUNT)?;
        if perf_len < 1 {
            return Err(Error::Config(format!(
                "invalid value for {}",
                keys::PERF_COUNT
            )));
        }

        let mut session = Self {
            id: Uuid::new_v4(),
            cfg,
            space,
            strategy,
            stages,
            trials: HashMap::new(),
            parked: VecDeque::new(),
            deliverable: VecDeque::new(),
            clients: Vec::new(),
            perf_len: perf_len as usize,
        };

        for stage in &mut session.stages {
            stage
                .init(&session.space, &mut session.cfg)
                .map_err(|e| stage_fault(stage.name(), e))?;
        }
        session.strategy.init(&session.space, &mut session.cfg)?;

        info!(
            session = %session.id,
            strategy = session.strategy.name(),
            dims = session.space.len(),
            "tuning session ready"
        );
        Ok(session)
    }

    /// Assemble a session from configuration alone: the `STRATEGY` key
    /// names the strategy and `LAYERS` names the pipeline stages.
    pub fn from_config(space: Space, mut cfg: Config) -> Result<Self> {
        cfg.register(CORE_KEYS);
        let strategy = build_strategy(cfg.get(keys::STRATEGY).unwrap_or("pro"))?;
        let stages = crate::layers::build_layers(&cfg)?;
        Self::new(space, cfg, strategy, stages)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn cfg_mut(&mut self) -> &mut Config {
        &mut self.cfg
    }

    pub fn converged(&self) -> bool {
        self.cfg.get_bool(keys::CONVERGED)
    }

    pub fn outstanding(&self) -> usize {
        self.trials.len()
    }

    /// A client entered the session.
    pub fn join(&mut self, client: &str) -> Result<()> {
        self.clients.push(client.to_string());
        self.cfg
            .set(keys::CLIENT_COUNT, &self.clients.len().to_string());
        for stage in &mut self.stages {
            stage
                .join(client)
                .map_err(|e| stage_fault(stage.name(), e))?;
        }
        info!(client, "client joined");
        Ok(())
    }

    /// A client left the session.
    pub fn leave(&mut self, client: &str) {
        self.clients.retain(|c| c != client);
        self.cfg
            .set(keys::CLIENT_COUNT, &self.clients.len().to_string());
        info!(client, "client left");
    }

    /// Produce the next candidate point for a client.
    pub fn fetch(&mut self, best_prev_id: u32) -> Result<FetchOutcome> {
        self.resume_parked()?;

        // Candidates whose forward pass completed while parked go out first.
        if let Some(point) = self.deliverable.pop_front() {
            return Ok(self.deliver(point, best_prev_id));
        }

        let mut retries = 0;
        loop {
            let mut flow = Flow::accept();
            let mut point = Point::empty();
            self.strategy.generate(&mut flow, &mut point)?;
            if flow.status == FlowStatus::Wait {
                return Ok(FetchOutcome::Busy);
            }

            match self.run_forward(point, 0)? {
                ForwardOutcome::Deliver(point) => return Ok(self.deliver(point, best_prev_id)),
                ForwardOutcome::Parked => return Ok(FetchOutcome::Busy),
                ForwardOutcome::Retry => {
                    retries += 1;
                    if retries > MAX_REPLACEMENTS {
                        return Err(Error::Strategy(
                            "pipeline keeps retrying candidate generation".into(),
                        ));
                    }
                }
            }
        }
    }

    /// Feed a client's measurement back through the pipeline and into the
    /// strategy. Reports for unknown ids are accepted and dropped.
    pub fn report(&mut self, id: u32, perf: Perf) -> Result<()> {
        self.resume_parked()?;

        let Some(mut trial) = self.trials.remove(&id) else {
            debug!(id, "ignoring report for unknown trial");
            return Ok(());
        };
        if perf.len() != self.perf_len {
            return Err(Error::SpaceMismatch {
                expected: self.perf_len,
                got: perf.len(),
            });
        }

        trial.perf = perf;
        trial.status = TrialStatus::PipelineRev;
        self.run_reverse(trial, self.stages.len())
    }

    /// The best point seen so far (id 0 before any report).
    pub fn best(&self) -> Point {
        self.strategy.best()
    }

    /// Drop an outstanding trial.
    pub fn kill(&mut self, id: u32) -> Result<()> {
        match self.trials.remove(&id) {
            Some(_) => {
                debug!(id, "trial killed");
                Ok(())
            }
            None => Err(Error::UnknownId(id)),
        }
    }

    /// Tear down the pipeline. Stage teardown failures are fatal.
    pub fn fini(&mut self) -> Result<()> {
        for stage in &mut self.stages {
            stage.fini().map_err(|e| stage_fault(stage.name(), e))?;
        }
        info!(session = %self.id, "tuning session closed");
        Ok(())
    }

    /// Handle one wire-level request. Errors become `Fail` replies with the
    /// message passed through verbatim.
    pub fn dispatch(&mut self, request: Request) -> Reply {
        match request {
            Request::Hello { client } => {
                debug!(client, "hello");
                Reply::ok()
            }
            Request::Session { config } => {
                for (key, val) in &config {
                    self.cfg.set(key, val);
                }
                Reply::ok()
            }
            Request::Join { client } => match self.join(&client) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::fail(e),
            },
            Request::Fetch { best_id } => match self.fetch(best_id) {
                Ok(FetchOutcome::Busy) => Reply::busy(),
                Ok(FetchOutcome::Point { point, best }) => Reply::with_point(point, best),
                Err(e) => Reply::fail(e),
            },
            Request::Report { id, perf } => match self.report(id, Perf::from_vec(perf)) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::fail(e),
            },
            Request::Best => Reply::with_best(self.best()),
            Request::Kill { id } => match self.kill(id) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::fail(e),
            },
            Request::Leave { client } => {
                self.leave(&client);
                Reply::ok()
            }
        }
    }

    fn deliver(&mut self, point: Point, best_prev_id: u32) -> FetchOutcome {
        let mut trial = Trial::new(point.clone(), self.perf_len);
        trial.status = TrialStatus::AwaitingClient;
        self.trials.insert(point.id, trial);

        let best = self.strategy.best();
        let best = (best.id != 0 && best.id > best_prev_id).then_some(best);
        FetchOutcome::Point { point, best }
    }

    /// Run the forward pipeline from `start`. Rejections hand the candidate
    /// back to the strategy and restart the pass with the replacement.
    fn run_forward(&mut self, mut point: Point, start: usize) -> Result<ForwardOutcome> {
        let mut idx = start;
        let mut rejects = 0;
        while idx < self.stages.len() {
            let mut flow = Flow::accept();
            let stage = &mut self.stages[idx];
            stage
                .generate(&mut flow, &mut point)
                .map_err(|e| stage_fault(stage.name(), e))?;

            match flow.status {
                FlowStatus::Accept => idx += 1,
                FlowStatus::Return => break,
                FlowStatus::Retry => return Ok(ForwardOutcome::Retry),
                FlowStatus::Wait => {
                    self.parked.push_back(Parked::Forward { point, stage: idx });
                    return Ok(ForwardOutcome::Parked);
                }
                FlowStatus::Reject => {
                    rejects += 1;
                    if rejects > MAX_REPLACEMENTS {
                        return Err(stage_fault(
                            self.stages[idx].name(),
                            Error::Strategy("stage rejects every candidate".into()),
                        ));
                    }
                    let mut rflow = Flow {
                        status: FlowStatus::Accept,
                        hint: flow.hint,
                    };
                    self.strategy.rejected(&mut rflow, &mut point, &mut self.cfg)?;
                    idx = 0;
                }
            }
        }
        Ok(ForwardOutcome::Deliver(point))
    }

    /// Run the reverse pipeline over stages `0..upper` in reverse order,
    /// then hand the trial to the strategy.
    fn run_reverse(&mut self, mut trial: Trial, upper: usize) -> Result<()> {
        let mut idx = upper;
        while idx > 0 {
            let i = idx - 1;
            let mut flow = Flow::accept();
            let stage = &mut self.stages[i];
            stage
                .analyze(&mut flow, &trial)
                .map_err(|e| stage_fault(stage.name(), e))?;

            match flow.status {
                FlowStatus::Accept => idx -= 1,
                FlowStatus::Return => {
                    debug!(id = trial.point.id, "trial discarded on the reverse pass");
                    return Ok(());
                }
                FlowStatus::Wait => {
                    self.parked.push_back(Parked::Reverse { trial, stage: i });
                    return Ok(());
                }
                FlowStatus::Reject => {
                    // The strategy absorbs the replacement; the client
                    // already has its answer and sees nothing.
                    let mut rflow = Flow {
                        status: FlowStatus::Accept,
                        hint: flow.hint,
                    };
                    let mut scratch = trial.point.clone();
                    self.strategy
                        .rejected(&mut rflow, &mut scratch, &mut self.cfg)?;
                    return Ok(());
                }
                FlowStatus::Retry => {
                    return Err(stage_fault(
                        self.stages[i].name(),
                        Error::Strategy("retry is not valid on the reverse pass".into()),
                    ));
                }
            }
        }

        trial.status = TrialStatus::Delivered;
        self.strategy.analyze(&trial, &mut self.cfg)
    }

    /// Re-offer parked trials whose stage reports ready.
    fn resume_parked(&mut self) -> Result<()> {
        for _ in 0..self.parked.len() {
            let Some(parked) = self.parked.pop_front() else {
                break;
            };
            let stage_idx = match &parked {
                Parked::Forward { stage, .. } | Parked::Reverse { stage, .. } => *stage,
            };
            if !self.stages[stage_idx].ready() {
                self.parked.push_back(parked);
                continue;
            }

            match parked {
                Parked::Forward { point, stage } => match self.run_forward(point, stage)? {
                    ForwardOutcome::Deliver(point) => self.deliverable.push_back(point),
                    // Re-parked, or the stage gave up on the candidate.
                    ForwardOutcome::Parked | ForwardOutcome::Retry => {}
                },
                Parked::Reverse { trial, stage } => self.run_reverse(trial, stage + 1)?,
            }
        }
        Ok(())
    }
}

fn stage_fault(stage: &str, err: Error) -> Error {
    match err {
        Error::Stage { .. } => err,
        other => Error::Stage {
            stage: stage.to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ReplyStatus;
    use at_types::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn grid_space() -> Space {
        Space::new().add_int("i", 0, 2, 1).add_int("j", 0, 2, 1)
    }

    fn int_term(p: &Point, i: usize) -> i64 {
        match &p.terms[i] {
            Value::Int(v) => *v,
            other => panic!("expected int, got {other:?}"),
        }
    }

    fn real_term(p: &Point, i: usize) -> f64 {
        match &p.terms[i] {
            Value::Real(v) => *v,
            other => panic!("expected real, got {other:?}"),
        }
    }

    fn session_with(space: Space, pairs: &[(&str, &str)], stages: Vec<Box<dyn Stage>>) -> Session {
        let mut cfg = Config::new();
        for (k, v) in pairs {
            cfg.set(k, v);
        }
        cfg.register(CORE_KEYS);
        let strategy = build_strategy(cfg.get(keys::STRATEGY).unwrap_or("pro")).unwrap();
        Session::new(space, cfg, strategy, stages).unwrap()
    }

    fn fetch_point(session: &mut Session) -> Option<Point> {
        match session.fetch(0).unwrap() {
            FetchOutcome::Point { point, .. } => Some(point),
            FetchOutcome::Busy => None,
        }
    }

    // -- test stages --------------------------------------------------------

    /// Rejects every candidate whose first term is zero, hinting (1, 0).
    struct RejectZero;

    impl Stage for RejectZero {
        fn name(&self) -> &'static str {
            "reject-zero"
        }

        fn generate(&mut self, flow: &mut Flow, point: &mut Point) -> Result<()> {
            if int_term(point, 0) == 0 {
                let mut hint = point.clone();
                hint.terms[0] = Value::Int(1);
                *flow = Flow::reject_with(Some(hint));
            } else {
                flow.status = FlowStatus::Accept;
            }
            Ok(())
        }
    }

    /// Parks the first candidate it sees, accepts everything afterwards.
    struct WaitOnce {
        parked: bool,
    }

    impl Stage for WaitOnce {
        fn name(&self) -> &'static str {
            "wait-once"
        }

        fn generate(&mut self, flow: &mut Flow, _point: &mut Point) -> Result<()> {
            flow.status = if self.parked {
                FlowStatus::Accept
            } else {
                self.parked = true;
                FlowStatus::Wait
            };
            Ok(())
        }
    }

    /// Counts how many candidates and reports pass through.
    struct Counter {
        fwd: Arc<AtomicUsize>,
        rev: Arc<AtomicUsize>,
    }

    impl Stage for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn generate(&mut self, flow: &mut Flow, _point: &mut Point) -> Result<()> {
            self.fwd.fetch_add(1, Ordering::SeqCst);
            flow.status = FlowStatus::Accept;
            Ok(())
        }

        fn analyze(&mut self, flow: &mut Flow, _trial: &Trial) -> Result<()> {
            self.rev.fetch_add(1, Ordering::SeqCst);
            flow.status = FlowStatus::Accept;
            Ok(())
        }
    }

    /// Short-circuits the forward pass.
    struct ReturnEarly;

    impl Stage for ReturnEarly {
        fn name(&self) -> &'static str {
            "return-early"
        }

        fn generate(&mut self, flow: &mut Flow, _point: &mut Point) -> Result<()> {
            flow.status = FlowStatus::Return;
            Ok(())
        }
    }

    /// Sends the strategy back to the drawing board once.
    struct RetryOnce {
        done: bool,
    }

    impl Stage for RetryOnce {
        fn name(&self) -> &'static str {
            "retry-once"
        }

        fn generate(&mut self, flow: &mut Flow, _point: &mut Point) -> Result<()> {
            flow.status = if self.done {
                FlowStatus::Accept
            } else {
                self.done = true;
                FlowStatus::Retry
            };
            Ok(())
        }
    }

    // -- end-to-end scenarios ----------------------------------------------

    #[test]
    fn exhaustive_sweep_end_to_end() {
        let mut session = session_with(
            grid_space(),
            &[(keys::STRATEGY, "exhaustive"), (keys::PASSES, "1")],
            Vec::new(),
        );

        let mut points = Vec::new();
        for _ in 0..9 {
            points.push(fetch_point(&mut session).expect("exhaustive never blocks"));
        }
        assert_eq!(session.outstanding(), 9);

        for p in points {
            assert!(!session.converged());
            let perf = (int_term(&p, 0) + int_term(&p, 1)) as f64;
            session.report(p.id, Perf::scalar(perf)).unwrap();
        }

        assert!(session.converged());
        assert_eq!(session.outstanding(), 0);
        let best = session.best();
        assert_eq!(best.terms, vec![Value::Int(0), Value::Int(0)]);
    }

    #[test]
    fn pro_converges_on_a_real_bowl_end_to_end() {
        let space = Space::new().add_real("x", -5.0, 5.0);
        let mut session = session_with(
            space,
            &[(keys::STRATEGY, "pro"), (keys::RANDOM_SEED, "17")],
            Vec::new(),
        );

        let mut pending: Vec<Point> = Vec::new();
        let mut fetches = 0;
        while !session.converged() {
            assert!(fetches < 100, "no convergence in 100 fetches");
            match fetch_point(&mut session) {
                Some(p) => {
                    fetches += 1;
                    pending.push(p);
                }
                None => {
                    for p in pending.drain(..) {
                        let perf = real_term(&p, 0).powi(2);
                        session.report(p.id, Perf::scalar(perf)).unwrap();
                    }
                }
            }
        }

        let best = session.best();
        assert!(real_term(&best, 0).abs() <= 0.05, "best too far: {best:?}");
        assert_eq!(session.cfg().get(keys::CONVERGED), Some("1"));
    }

    #[test]
    fn pro_finds_the_exact_integer_minimum_with_monotone_best() {
        let space = Space::new().add_int("a", 0, 10, 1).add_int("b", 0, 10, 1);
        let mut session = session_with(
            space,
            &[
                (keys::STRATEGY, "pro"),
                (keys::RANDOM_SEED, "17"),
                (keys::INIT_METHOD, "point_fast"),
            ],
            Vec::new(),
        );

        let f = |p: &Point| {
            let a = int_term(p, 0) as f64;
            let b = int_term(p, 1) as f64;
            (a - 3.0).powi(2) + (b - 7.0).powi(2)
        };

        let mut pending: Vec<Point> = Vec::new();
        let mut last_best = f64::INFINITY;
        let mut fetches = 0;
        while !session.converged() {
            assert!(fetches < 2000, "no convergence");
            match fetch_point(&mut session) {
                Some(p) => {
                    fetches += 1;
                    pending.push(p);
                }
                None => {
                    for p in pending.drain(..) {
                        session.report(p.id, Perf::scalar(f(&p))).unwrap();
                        let best = session.best();
                        if best.id != 0 {
                            let best_perf = f(&best);
                            assert!(best_perf <= last_best, "best regressed");
                            last_best = best_perf;
                        }
                    }
                }
            }
        }

        let best = session.best();
        assert_eq!(int_term(&best, 0), 3);
        assert_eq!(int_term(&best, 1), 7);
    }

    #[test]
    fn angel_phases_run_in_order_end_to_end() {
        let space = Space::new().add_real("x", -5.0, 5.0);
        let mut session = session_with(
            space,
            &[
                (keys::STRATEGY, "angel"),
                (keys::RANDOM_SEED, "23"),
                (keys::PERF_COUNT, "2"),
                (keys::ANGEL_LEEWAY, "0.1"),
            ],
            Vec::new(),
        );
        assert_eq!(session.cfg().get(keys::ANGEL_PHASE), Some("0"));

        let mut saw_phase_one = false;
        let mut evals = 0;
        while !session.converged() {
            assert!(evals < 2000, "no convergence");
            let p = fetch_point(&mut session).expect("single trial in flight");
            let x = real_term(&p, 0);
            session
                .report(p.id, Perf::from_vec(vec![(x - 1.0).abs(), (x + 1.0).abs()]))
                .unwrap();
            evals += 1;
            if session.cfg().get(keys::ANGEL_PHASE) == Some("1") {
                saw_phase_one = true;
            }
        }
        assert!(saw_phase_one, "second phase never ran");

        let best = real_term(&session.best(), 0);
        assert!(best < 1.0 && best > -1.0, "best {best} out of band");
    }

    #[test]
    fn reject_with_hint_reaches_client_and_strategy() {
        let mut session = session_with(
            grid_space(),
            &[(keys::STRATEGY, "exhaustive")],
            vec![Box::new(RejectZero)],
        );

        // The first sweep candidate is (0, 0); the stage turns it into (1, 0).
        let p = fetch_point(&mut session).unwrap();
        assert_eq!(p.terms, vec![Value::Int(1), Value::Int(0)]);

        session.report(p.id, Perf::scalar(0.25)).unwrap();
        let best = session.best();
        assert_eq!(
            best.terms,
            vec![Value::Int(1), Value::Int(0)],
            "strategy analyzed something other than the hinted point"
        );
    }

    #[test]
    fn killed_trials_swallow_their_report() {
        let mut session = session_with(grid_space(), &[(keys::STRATEGY, "exhaustive")], Vec::new());

        let p = fetch_point(&mut session).unwrap();
        session.kill(p.id).unwrap();
        assert_eq!(session.outstanding(), 0);

        // The late report is a no-op: accepted, never analyzed.
        session.report(p.id, Perf::scalar(1.0)).unwrap();
        assert_eq!(session.best().id, 0);

        assert!(matches!(session.kill(999), Err(Error::UnknownId(999))));
    }

    #[test]
    fn parked_candidates_resume_without_loss() {
        let mut session = session_with(
            grid_space(),
            &[(keys::STRATEGY, "exhaustive")],
            vec![Box::new(WaitOnce { parked: false })],
        );

        // The stage parks the first candidate, so the fetch reports busy.
        assert!(fetch_point(&mut session).is_none());
        assert_eq!(session.outstanding(), 0);

        // Next dispatch resumes the parked trial; the same candidate (same
        // id, same terms) comes out rather than being dropped.
        let p = fetch_point(&mut session).expect("parked candidate resumes");
        assert_eq!(p.id, 1);
        assert_eq!(p.terms, vec![Value::Int(0), Value::Int(0)]);
    }

    #[test]
    fn every_fetch_is_one_trial_and_one_analyze() {
        let fwd = Arc::new(AtomicUsize::new(0));
        let rev = Arc::new(AtomicUsize::new(0));
        let mut session = session_with(
            grid_space(),
            &[(keys::STRATEGY, "exhaustive")],
            vec![Box::new(Counter {
                fwd: fwd.clone(),
                rev: rev.clone(),
            })],
        );

        let mut points = Vec::new();
        for _ in 0..4 {
            points.push(fetch_point(&mut session).unwrap());
        }
        assert_eq!(fwd.load(Ordering::SeqCst), 4);
        assert_eq!(session.outstanding(), 4);

        for p in points {
            session.report(p.id, Perf::scalar(1.0)).unwrap();
        }
        assert_eq!(rev.load(Ordering::SeqCst), 4);
        assert_eq!(session.outstanding(), 0);

        // A rogue report touches neither the pipeline nor the strategy.
        session.report(404, Perf::scalar(1.0)).unwrap();
        assert_eq!(rev.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn return_short_circuits_the_remaining_stages() {
        let fwd = Arc::new(AtomicUsize::new(0));
        let rev = Arc::new(AtomicUsize::new(0));
        let mut session = session_with(
            grid_space(),
            &[(keys::STRATEGY, "exhaustive")],
            vec![
                Box::new(ReturnEarly),
                Box::new(Counter {
                    fwd: fwd.clone(),
                    rev: rev.clone(),
                }),
            ],
        );

        let p = fetch_point(&mut session).unwrap();
        assert_eq!(fwd.load(Ordering::SeqCst), 0, "later stage saw the point");

        // The reverse pass starts at the last stage, so the counter sees
        // the report before the short-circuiting stage does.
        session.report(p.id, Perf::scalar(1.0)).unwrap();
        assert_eq!(rev.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_asks_the_strategy_for_a_fresh_candidate() {
        let mut session = session_with(
            grid_space(),
            &[(keys::STRATEGY, "exhaustive")],
            vec![Box::new(RetryOnce { done: false })],
        );

        // Candidate id 1 is discarded by the retry; id 2 is delivered.
        let p = fetch_point(&mut session).unwrap();
        assert_eq!(p.id, 2);
        assert_eq!(session.outstanding(), 1);
    }

    #[test]
    fn best_is_resent_only_when_newer() {
        let mut session = session_with(grid_space(), &[(keys::STRATEGY, "exhaustive")], Vec::new());

        let p = fetch_point(&mut session).unwrap();
        session.report(p.id, Perf::scalar(1.0)).unwrap();
        let best_id = session.best().id;

        match session.fetch(0).unwrap() {
            FetchOutcome::Point { best, .. } => {
                assert_eq!(best.expect("client is behind").id, best_id);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match session.fetch(best_id).unwrap() {
            FetchOutcome::Point { best, .. } => {
                assert!(best.is_none(), "client already knew this best");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn dispatch_maps_requests_to_replies() {
        let mut session = session_with(grid_space(), &[(keys::STRATEGY, "exhaustive")], Vec::new());

        let reply = session.dispatch(Request::Join {
            client: "c1".into(),
        });
        assert_eq!(reply.status, ReplyStatus::Ok);
        assert_eq!(session.cfg().get(keys::CLIENT_COUNT), Some("1"));

        let reply = session.dispatch(Request::Fetch { best_id: 0 });
        assert_eq!(reply.status, ReplyStatus::Ok);
        let point = reply.point.unwrap();

        let reply = session.dispatch(Request::Report {
            id: point.id,
            perf: vec![2.0],
        });
        assert_eq!(reply.status, ReplyStatus::Ok);

        let reply = session.dispatch(Request::Best);
        assert_eq!(reply.best.unwrap().id, point.id);

        let reply = session.dispatch(Request::Kill { id: 12345 });
        assert_eq!(reply.status, ReplyStatus::Fail);
        assert!(reply.message.unwrap().contains("12345"));

        let reply = session.dispatch(Request::Leave {
            client: "c1".into(),
        });
        assert_eq!(reply.status, ReplyStatus::Ok);
        assert_eq!(session.cfg().get(keys::CLIENT_COUNT), Some("0"));
    }

    #[test]
    fn bad_perf_length_fails_the_report() {
        let mut session = session_with(grid_space(), &[(keys::STRATEGY, "exhaustive")], Vec::new());
        let p = fetch_point(&mut session).unwrap();
        let err = session
            .report(p.id, Perf::from_vec(vec![1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, Error::SpaceMismatch { expected: 1, got: 2 }));
    }

    #[test]
    fn session_rejects_invalid_spaces() {
        let bad = Space::new().add_int("x", 9, 1, 1);
        let mut cfg = Config::new();
        cfg.set(keys::STRATEGY, "random");
        let strategy = build_strategy("random").unwrap();
        assert!(Session::new(bad, cfg, strategy, Vec::new()).is_err());
    }
}
