//! Client request and reply types.
//!
//! These model the framed messages a tuning client exchanges with the
//! session, independent of any particular transport. A front end frames and
//! ships them however it likes; the session consumes them through
//! [`crate::Session::dispatch`].

use serde::{Deserialize, Serialize};

use at_types::Point;

/// One client request. Clients issue one request at a time per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Handshake.
    Hello { client: String },
    /// Merge configuration directives into the session store.
    Session { config: Vec<(String, String)> },
    /// Enter the tuning session.
    Join { client: String },
    /// Ask for the next candidate point. `best_id` is the id of the best
    /// point this client already knows, so unchanged bests are not resent.
    Fetch { best_id: u32 },
    /// Report the measured objective values for an outstanding point.
    Report { id: u32, perf: Vec<f64> },
    /// Ask for the best point seen so far.
    Best,
    /// Drop an outstanding trial.
    Kill { id: u32 },
    /// Leave the tuning session.
    Leave { client: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    Ok,
    Busy,
    Fail,
}

/// Reply to one request. `Fail` replies carry the error text verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: ReplyStatus,
    pub point: Option<Point>,
    pub best: Option<Point>,
    pub message: Option<String>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            status: ReplyStatus::Ok,
            point: None,
            best: None,
            message: None,
        }
    }

    pub fn busy() -> Self {
        Self {
            status: ReplyStatus::Busy,
            ..Self::ok()
        }
    }

    pub fn fail(message: impl ToString) -> Self {
        Self {
            status: ReplyStatus::Fail,
            message: Some(message.to_string()),
            ..Self::ok()
        }
    }

    pub fn with_point(point: Point, best: Option<Point>) -> Self {
        Self {
            point: Some(point),
            best,
            ..Self::ok()
        }
    }

    pub fn with_best(best: Point) -> Self {
        Self {
            best: Some(best),
            ..Self::ok()
        }
    }
}
