//! Built-in processing stages.

mod log;

pub use log::LogStage;

use at_types::{keys, Config, Error, Result};

use crate::pipeline::Stage;

/// Build the pipeline named by the `LAYERS` configuration key: a comma or
/// whitespace separated list of stage names, forward-pass order.
pub fn build_layers(cfg: &Config) -> Result<Vec<Box<dyn Stage>>> {
    let Some(list) = cfg.get(keys::LAYERS) else {
        return Ok(Vec::new());
    };

    let mut stages: Vec<Box<dyn Stage>> = Vec::new();
    for name in list
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
    {
        match name.trim().to_ascii_lowercase().as_str() {
            "logger" | "log" => stages.push(Box::new(LogStage::new())),
            other => {
                return Err(Error::Config(format!("unknown pipeline stage '{other}'")));
            }
        }
    }
    Ok(stages)
}
