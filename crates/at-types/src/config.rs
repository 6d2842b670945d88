//! Session configuration store.
//!
//! A flat string-to-string map with typed accessors. Keys are canonicalized
//! to upper case; insertion order is preserved so serialization is
//! deterministic. Components register the keys they understand together
//! with a default and a help string, and `get` falls back to those
//! defaults for unset keys.

use std::fmt;
use std::path::Path;

use crate::errors::{Error, Result};

/// Description of one configuration key a component understands.
#[derive(Debug, Clone, Copy)]
pub struct KeyInfo {
    pub key: &'static str,
    pub default: Option<&'static str>,
    pub help: &'static str,
}

/// Ordered string-to-string configuration map.
#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: Vec<(String, String)>,
    registered: Vec<KeyInfo>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the keys a component understands. Registered defaults back
    /// every `get` for keys with no explicit entry.
    pub fn register(&mut self, info: &[KeyInfo]) {
        for item in info {
            if !self
                .registered
                .iter()
                .any(|k| k.key.eq_ignore_ascii_case(item.key))
            {
                self.registered.push(*item);
            }
        }
    }

    /// Look up a value, falling back to the registered default.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .or_else(|| {
                self.registered
                    .iter()
                    .find(|k| k.key.eq_ignore_ascii_case(key))
                    .and_then(|k| k.default)
            })
    }

    /// Set a value, replacing any previous entry for the key in place.
    pub fn set(&mut self, key: &str, val: &str) {
        let key = key.trim().to_ascii_uppercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = val.to_string(),
            None => self.entries.push((key, val.to_string())),
        }
    }

    /// Boolean accessor. Recognizes `1/true/yes/on` and `0/false/no/off`,
    /// case-insensitively; anything else (including an unset key) is false.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(v) => matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            None => false,
        }
    }

    /// Base-10 integer accessor.
    pub fn get_int(&self, key: &str) -> Result<i64> {
        let v = self
            .get(key)
            .ok_or_else(|| Error::Config(format!("key {key} is not set")))?;
        v.trim()
            .parse()
            .map_err(|_| Error::Config(format!("key {key} has non-integer value '{v}'")))
    }

    /// Real-valued accessor. The whole value must parse.
    pub fn get_real(&self, key: &str) -> Result<f64> {
        let v = self
            .get(key)
            .ok_or_else(|| Error::Config(format!("key {key} is not set")))?;
        v.trim()
            .parse()
            .map_err(|_| Error::Config(format!("key {key} has non-real value '{v}'")))
    }

    fn split_array(v: &str) -> impl Iterator<Item = &str> {
        v.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
    }

    /// Number of items in a comma- or whitespace-separated list value.
    pub fn array_len(&self, key: &str) -> usize {
        self.get(key).map_or(0, |v| Self::split_array(v).count())
    }

    /// Item `i` of a list value.
    pub fn array_item(&self, key: &str, i: usize) -> Option<&str> {
        self.get(key).and_then(|v| Self::split_array(v).nth(i))
    }

    /// Item `i` of a list value, parsed as a real.
    pub fn array_real(&self, key: &str, i: usize) -> Result<f64> {
        let item = self
            .array_item(key, i)
            .ok_or_else(|| Error::Config(format!("key {key} has no item {i}")))?;
        item.parse()
            .map_err(|_| Error::Config(format!("key {key} item {i} is not a real: '{item}'")))
    }

    /// Merge `KEY=VALUE` lines. `#` starts a comment, blank lines are
    /// skipped, and later keys override earlier ones.
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        for (lineno, raw) in text.lines().enumerate() {
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, val) = line.split_once('=').ok_or_else(|| {
                Error::Config(format!("line {}: expected KEY=VALUE, got '{line}'", lineno + 1))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::Config(format!("line {}: empty key", lineno + 1)));
            }
            self.set(key, val.trim());
        }
        Ok(())
    }

    /// Load a configuration file.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text)
    }

    /// Deterministic `KEY=VALUE` rendering in insertion order.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.entries {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}
