//! Point logger stage.
//!
//! Appends one line per analyzed trial to a log file, with reals rendered in
//! both decimal and hexadecimal form so values survive a round trip through
//! the log.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use chrono::Utc;

use at_types::{
    format_hex_real, keys, Config, Error, Flow, FlowStatus, KeyInfo, Result, Space, Trial, Value,
};

use crate::pipeline::Stage;

const KEYS: &[KeyInfo] = &[
    KeyInfo {
        key: keys::LOG_FILE,
        default: None,
        help: "Name of the point/performance log file.",
    },
    KeyInfo {
        key: keys::LOG_MODE,
        default: Some("a"),
        help: "File open mode: a to append, w to overwrite.",
    },
];

pub struct LogStage {
    out: Option<BufWriter<std::fs::File>>,
    space: Space,
}

impl LogStage {
    pub fn new() -> Self {
        Self {
            out: None,
            space: Space::new(),
        }
    }

    fn render_term(&self, i: usize, value: &Value) -> Result<String> {
        Ok(match value {
            Value::Int(v) => v.to_string(),
            Value::Real(v) => format!("{:.6}[{}]", v, format_hex_real(*v)),
            Value::Str(idx) => {
                let dim = self.space.dim(i);
                match &dim.kind {
                    at_types::DimensionKind::Enum { choices } => {
                        let s = choices.get(*idx).ok_or_else(|| {
                            Error::Parse(format!("choice index {idx} invalid for '{}'", dim.name))
                        })?;
                        format!("\"{s}\"")
                    }
                    _ => {
                        return Err(Error::Parse(format!(
                            "term type does not match dimension '{}'",
                            dim.name
                        )))
                    }
                }
            }
        })
    }
}

impl Default for LogStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for LogStage {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn keys(&self) -> &'static [KeyInfo] {
        KEYS
    }

    fn init(&mut self, space: &Space, cfg: &mut Config) -> Result<()> {
        let filename = cfg
            .get(keys::LOG_FILE)
            .ok_or_else(|| Error::Config(format!("{} config key empty", keys::LOG_FILE)))?
            .to_string();

        let file = match cfg.get(keys::LOG_MODE).unwrap_or("a") {
            "w" => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&filename)?,
            _ => OpenOptions::new().append(true).create(true).open(&filename)?,
        };
        let mut out = BufWriter::new(file);

        writeln!(out, "* Begin tuning session log.")?;
        writeln!(out, "* Timestamp: {}", Utc::now().to_rfc2822())?;
        out.flush()?;

        self.space = space.clone();
        self.out = Some(out);
        Ok(())
    }

    fn join(&mut self, client: &str) -> Result<()> {
        if let Some(out) = &mut self.out {
            writeln!(out, "Client \"{client}\" joined the tuning session.")?;
            out.flush()?;
        }
        Ok(())
    }

    fn analyze(&mut self, flow: &mut Flow, trial: &Trial) -> Result<()> {
        let mut line = format!("Point #{}: (", trial.point.id);
        for (i, term) in trial.point.terms.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&self.render_term(i, term)?);
        }
        line.push_str(") ");

        if trial.perf.len() > 1 {
            line.push_str("=> (");
            for (i, obj) in trial.perf.obj.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                line.push_str(&format!("{:.6}[{}]", obj, format_hex_real(*obj)));
            }
            line.push_str(") ");
        }
        line.push_str(&format!("=> {:.6}", trial.perf.unify()));

        if let Some(out) = &mut self.out {
            writeln!(out, "{line}")?;
            out.flush()?;
        }

        flow.status = FlowStatus::Accept;
        Ok(())
    }

    fn fini(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            writeln!(out, "*")?;
            writeln!(out, "* End tuning session.")?;
            writeln!(out, "*")?;
            out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use at_types::{parse_hex_real, Perf, Point};

    fn sample_space() -> Space {
        Space::new()
            .add_int("i", 0, 10, 1)
            .add_real("r", 0.0, 1.0)
            .add_enum("e", vec!["fast".into(), "slow".into()])
    }

    fn logged_trial(perf: Perf) -> (String, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.log");

        let mut cfg = Config::new();
        cfg.register(KEYS);
        cfg.set(keys::LOG_FILE, path.to_str().unwrap());

        let mut stage = LogStage::new();
        stage.init(&sample_space(), &mut cfg).unwrap();
        stage.join("client-1").unwrap();

        let mut trial = Trial::new(
            Point::new(7, vec![Value::Int(5), Value::Real(0.1), Value::Str(1)]),
            perf.len(),
        );
        trial.perf = perf;

        let mut flow = Flow::accept();
        stage.analyze(&mut flow, &trial).unwrap();
        assert_eq!(flow.status, FlowStatus::Accept);
        stage.fini().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines = text.lines().map(String::from).collect();
        (text, lines)
    }

    #[test]
    fn single_objective_line_format() {
        let (text, lines) = logged_trial(Perf::scalar(2.5));
        assert!(lines[0].starts_with("* Begin tuning session log."));
        assert!(text.contains("Client \"client-1\" joined the tuning session."));

        let point_line = lines
            .iter()
            .find(|l| l.starts_with("Point #7: "))
            .expect("missing point line");
        assert!(point_line.starts_with("Point #7: (5,0.100000["));
        assert!(point_line.contains("\"slow\""));
        assert!(point_line.ends_with("=> 2.500000"));
        assert!(text.ends_with("*\n* End tuning session.\n*\n"));
    }

    #[test]
    fn multi_objective_lines_list_each_objective() {
        let (_text, lines) = logged_trial(Perf::from_vec(vec![1.0, 2.0]));
        let point_line = lines
            .iter()
            .find(|l| l.starts_with("Point #7: "))
            .unwrap();
        assert!(point_line.contains("=> (1.000000["));
        assert!(point_line.ends_with("=> 3.000000"), "unified value is the sum");
    }

    #[test]
    fn logged_reals_round_trip_through_the_hex_form() {
        let (_text, lines) = logged_trial(Perf::scalar(0.3));
        let point_line = lines
            .iter()
            .find(|l| l.starts_with("Point #7: "))
            .unwrap();

        // Pull the bracketed hex rendering of the real term back out.
        let open = point_line.find('[').unwrap();
        let close = point_line[open..].find(']').unwrap() + open;
        let parsed = parse_hex_real(&point_line[open + 1..close]).unwrap();
        assert_eq!(parsed.to_bits(), 0.1f64.to_bits());
    }

    #[test]
    fn init_without_log_file_is_a_config_error() {
        let mut cfg = Config::new();
        cfg.register(KEYS);
        let mut stage = LogStage::new();
        assert!(stage.init(&sample_space(), &mut cfg).is_err());
    }

    #[test]
    fn overwrite_mode_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.log");
        std::fs::write(&path, "stale contents\n").unwrap();

        let mut cfg = Config::new();
        cfg.register(KEYS);
        cfg.set(keys::LOG_FILE, path.to_str().unwrap());
        cfg.set(keys::LOG_MODE, "w");

        let mut stage = LogStage::new();
        stage.init(&sample_space(), &mut cfg).unwrap();
        stage.fini().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale contents"));
        assert!(text.starts_with("* Begin tuning session log."));
    }
}
