//! # at-session
//!
//! Session core for the Attune tuning framework.
//!
//! A session owns the search space, the configuration store, one search
//! strategy, and an ordered pipeline of processing stages. Clients drive it
//! through a small request/reply surface: join, fetch a candidate point,
//! report its measured performance, ask for the best point so far, or kill
//! an outstanding trial. Transport framing stays outside this crate; the
//! serializable request and reply types are the wire-neutral interface.

pub mod layers;
mod pipeline;
mod protocol;
mod session;

pub use layers::{build_layers, LogStage};
pub use pipeline::Stage;
pub use protocol::{Reply, ReplyStatus, Request};
pub use session::{FetchOutcome, Session};
