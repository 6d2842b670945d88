//! Flow control and trial records shared by strategies, stages, and the
//! session core.

use serde::{Deserialize, Serialize};

use crate::perf::Perf;
use crate::point::Point;

/// Verdict a strategy or pipeline stage attaches to the trial it was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStatus {
    /// Pass to the next stage in the current direction.
    Accept,
    /// Abort the current direction; the strategy picks a replacement,
    /// guided by the hint point when one is supplied.
    Reject,
    /// Park the trial; it re-enters at the same stage once that stage
    /// signals readiness.
    Wait,
    /// Short-circuit the remaining stages.
    Return,
    /// Ask the strategy for a fresh candidate.
    Retry,
}

/// Control record passed alongside every point moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub status: FlowStatus,
    pub hint: Option<Point>,
}

impl Flow {
    pub fn accept() -> Self {
        Self {
            status: FlowStatus::Accept,
            hint: None,
        }
    }

    pub fn reject_with(hint: Option<Point>) -> Self {
        Self {
            status: FlowStatus::Reject,
            hint,
        }
    }
}

impl Default for Flow {
    fn default() -> Self {
        Self::accept()
    }
}

/// Lifecycle state of an outstanding trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Generating,
    PipelineFwd,
    AwaitingClient,
    PipelineRev,
    Delivered,
}

/// One candidate in flight: created when the strategy generates a point,
/// retired when the strategy analyzes the report (or the trial is killed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub point: Point,
    pub perf: Perf,
    pub status: TrialStatus,
}

impl Trial {
    pub fn new(point: Point, perf_len: usize) -> Self {
        Self {
            point,
            perf: Perf::reset_with(perf_len),
            status: TrialStatus::Generating,
        }
    }
}
