//! Processing stage contract.
//!
//! A session runs an ordered list of stages. Every generated point passes
//! through each stage on its way out (`generate`), and every reported trial
//! passes back through in reverse order (`analyze`). A stage steers the
//! trial with the flow status it leaves behind: accept it onward, reject it
//! back to the strategy (optionally with a replacement hint), park it until
//! the stage is ready, short-circuit the rest of the pipeline, or send the
//! strategy back to the drawing board.

use at_types::{Config, Flow, FlowStatus, KeyInfo, Point, Result, Space, Trial};

/// One element of the session's processing pipeline.
///
/// Every hook is optional; the defaults accept everything and do nothing,
/// so a stage only implements the directions it cares about.
pub trait Stage: Send {
    /// Name used by the `LAYERS` configuration key and error reports.
    fn name(&self) -> &'static str;

    /// Configuration keys this stage understands.
    fn keys(&self) -> &'static [KeyInfo] {
        &[]
    }

    /// Called once per session before any trial flows.
    fn init(&mut self, _space: &Space, _cfg: &mut Config) -> Result<()> {
        Ok(())
    }

    /// A client joined the session.
    fn join(&mut self, _client: &str) -> Result<()> {
        Ok(())
    }

    /// Forward pass: observe or veto a candidate on its way to a client.
    fn generate(&mut self, flow: &mut Flow, _point: &mut Point) -> Result<()> {
        flow.status = FlowStatus::Accept;
        Ok(())
    }

    /// Reverse pass: observe or veto a reported trial before analysis.
    fn analyze(&mut self, flow: &mut Flow, _trial: &Trial) -> Result<()> {
        flow.status = FlowStatus::Accept;
        Ok(())
    }

    /// Whether a trial this stage parked may resume. Polled cooperatively
    /// on each request dispatch.
    fn ready(&mut self) -> bool {
        true
    }

    /// Called once at session teardown.
    fn fini(&mut self) -> Result<()> {
        Ok(())
    }
}
