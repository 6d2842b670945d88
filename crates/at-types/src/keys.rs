//! Well-known configuration keys.
//!
//! Strategies and stages contribute further keys through their registered
//! [`crate::KeyInfo`] tables; the constants here are the ones the session
//! core and more than one component need to agree on.

/// Which search strategy drives the session.
pub const STRATEGY: &str = "STRATEGY";
/// Ordered list of processing stages.
pub const LAYERS: &str = "LAYERS";
/// Published by the strategy: "1" once the search has converged.
pub const CONVERGED: &str = "CONVERGED";
/// Seed for the pseudo-random number generator.
pub const RANDOM_SEED: &str = "RANDOM_SEED";
/// Point the search starts from, in `( v1, v2, ... )` form.
pub const INIT_POINT: &str = "INIT_POINT";
/// Number of objectives in every performance report.
pub const PERF_COUNT: &str = "PERF_COUNT";
/// Number of clients that have joined the session.
pub const CLIENT_COUNT: &str = "CLIENT_COUNT";

// Exhaustive search.
pub const PASSES: &str = "PASSES";

// PRO simplex search.
pub const SIMPLEX_SIZE: &str = "SIMPLEX_SIZE";
pub const INIT_METHOD: &str = "INIT_METHOD";
pub const INIT_PERCENT: &str = "INIT_PERCENT";
pub const REFLECT: &str = "REFLECT";
pub const EXPAND: &str = "EXPAND";
pub const CONTRACT: &str = "CONTRACT";
pub const SHRINK: &str = "SHRINK";
pub const CONVERGE_FV: &str = "CONVERGE_FV";
pub const CONVERGE_SZ: &str = "CONVERGE_SZ";

// ANGEL multi-objective search.
pub const INIT_RADIUS: &str = "INIT_RADIUS";
pub const REJECT_METHOD: &str = "REJECT_METHOD";
pub const FVAL_TOL: &str = "FVAL_TOL";
pub const SIZE_TOL: &str = "SIZE_TOL";
pub const DIST_TOL: &str = "DIST_TOL";
pub const TOL_CNT: &str = "TOL_CNT";
pub const ANGEL_LOOSE: &str = "ANGEL_LOOSE";
pub const ANGEL_MULT: &str = "ANGEL_MULT";
pub const ANGEL_ANCHOR: &str = "ANGEL_ANCHOR";
pub const ANGEL_SAMESIMPLEX: &str = "ANGEL_SAMESIMPLEX";
pub const ANGEL_LEEWAY: &str = "ANGEL_LEEWAY";
pub const ANGEL_PHASE: &str = "ANGEL_PHASE";

// Point logger stage.
pub const LOG_FILE: &str = "LOG_FILE";
pub const LOG_MODE: &str = "LOG_MODE";
