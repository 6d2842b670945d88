//! # at-search
//!
//! Search strategies for the Attune tuning framework.
//!
//! Provides the vertex/simplex geometry shared by the simplex-based
//! strategies, the [`Strategy`] contract every search implements, and the
//! four built-in searches: exhaustive enumeration, uniform random, the PRO
//! parallel simplex search, and the ANGEL lexicographic multi-objective
//! simplex search.

mod angel;
mod exhaustive;
mod pro;
mod random;
mod strategy;
mod vertex;

pub use angel::Angel;
pub use exhaustive::Exhaustive;
pub use pro::Pro;
pub use random::RandomSearch;
pub use strategy::{build_strategy, Strategy};
pub use vertex::{Simplex, Vertex};
