//! The strategy contract.

use rand::rngs::StdRng;
use rand::SeedableRng;

use at_types::{keys, Config, Error, Flow, KeyInfo, Point, Result, Space, Trial};

/// Common trait for all search strategies.
///
/// A strategy owns its search state, the best point seen so far, and the
/// monotonic id counter its candidates are numbered with. The session core
/// drives it through `generate`/`analyze` and consults `best` on demand;
/// `rejected` runs when a pipeline stage or client refuses a candidate.
pub trait Strategy: Send {
    /// Configuration keys this strategy understands.
    fn keys(&self) -> &'static [KeyInfo] {
        &[]
    }

    /// Initialize (or re-initialize) for a search space. Re-initializing
    /// with a different space resets the search; the strategy publishes
    /// `CONVERGED=0` either way.
    fn init(&mut self, space: &Space, cfg: &mut Config) -> Result<()>;

    /// Produce the next candidate in `point`, or set the flow status to
    /// `Wait` when no candidate is available right now.
    fn generate(&mut self, flow: &mut Flow, point: &mut Point) -> Result<()>;

    /// Replace a refused candidate. When the flow carries a hint point the
    /// strategy adopts it (under the refused candidate's id) and echoes it
    /// back; otherwise it produces a replacement by its own method.
    fn rejected(&mut self, flow: &mut Flow, point: &mut Point, cfg: &mut Config) -> Result<()>;

    /// Feed back the observed performance for an outstanding candidate.
    fn analyze(&mut self, trial: &Trial, cfg: &mut Config) -> Result<()>;

    /// The best point seen so far (id 0 before any report).
    fn best(&self) -> Point;

    /// Strategy name as used by the `STRATEGY` configuration key.
    fn name(&self) -> &'static str;
}

/// Build the strategy named by the `STRATEGY` configuration key.
pub fn build_strategy(name: &str) -> Result<Box<dyn Strategy>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "exhaustive" => Ok(Box::new(crate::Exhaustive::new())),
        "random" => Ok(Box::new(crate::RandomSearch::new())),
        "pro" => Ok(Box::new(crate::Pro::new())),
        "angel" => Ok(Box::new(crate::Angel::new())),
        other => Err(Error::Config(format!("unknown strategy '{other}'"))),
    }
}

/// Seed a generator from the `RANDOM_SEED` key, falling back to entropy.
pub(crate) fn seeded_rng(cfg: &Config) -> StdRng {
    match cfg.get(keys::RANDOM_SEED) {
        Some(v) => match v.trim().parse::<u64>() {
            Ok(seed) => StdRng::seed_from_u64(seed),
            Err(_) => StdRng::from_entropy(),
        },
        None => StdRng::from_entropy(),
    }
}
