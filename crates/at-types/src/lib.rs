//! # at-types
//!
//! Shared data model for the Attune auto-tuning framework.
//!
//! Provides the search-space description (values, dimensions, spaces),
//! candidate points and performance records, trial and flow-control records
//! exchanged between the session core and its strategies/stages, and the
//! string-based configuration store that every component reads its options
//! from.

pub mod config;
pub mod errors;
pub mod flow;
pub mod keys;
pub mod perf;
pub mod point;
pub mod range;
pub mod space;
pub mod value;

pub use config::{Config, KeyInfo};
pub use errors::{Error, Result};
pub use flow::{Flow, FlowStatus, Trial, TrialStatus};
pub use perf::Perf;
pub use point::Point;
pub use range::{Dimension, DimensionKind};
pub use space::Space;
pub use value::{format_hex_real, parse_hex_real, Value};
