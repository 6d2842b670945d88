//! Tagged values carried by candidate points.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::errors::{Error, Result};

/// A single term of a candidate point.
///
/// `Str` carries the index into its enumerated dimension's choice list
/// rather than the string itself, which keeps the type `Copy` and makes the
/// geometric view used by the simplex strategies cheap. Rendering a `Str`
/// term back to text requires the owning [`crate::Space`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(usize),
}

impl Value {
    /// Ordering is defined per tag only; comparing across tags yields `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        self.compare(other)
    }
}

/// Render a real in C `%a` hexadecimal-significand form, e.g. `0x1.8p+1`.
///
/// The rendering is exact for every finite double, so values written this
/// way survive a parse round-trip bit for bit.
pub fn format_hex_real(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let bits = v.to_bits();
    let sign = if bits >> 63 == 1 { "-" } else { "" };
    let exp = ((bits >> 52) & 0x7ff) as i64;
    let mant = bits & 0x000f_ffff_ffff_ffff;

    if exp == 0 && mant == 0 {
        return format!("{sign}0x0p+0");
    }

    // Subnormals keep a zero leading digit and the minimum exponent.
    let (lead, exp_val) = if exp == 0 { (0u64, -1022i64) } else { (1u64, exp - 1023) };

    if mant == 0 {
        format!("{sign}0x{lead}p{exp_val:+}")
    } else {
        let mut frac = format!("{mant:013x}");
        while frac.len() > 1 && frac.ends_with('0') {
            frac.pop();
        }
        format!("{sign}0x{lead}.{frac}p{exp_val:+}")
    }
}

/// Parse a hexadecimal-significand real as produced by [`format_hex_real`].
pub fn parse_hex_real(s: &str) -> Result<f64> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    match body {
        "inf" => return Ok(if neg { f64::NEG_INFINITY } else { f64::INFINITY }),
        "nan" => return Ok(f64::NAN),
        _ => {}
    }

    let body = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .ok_or_else(|| Error::Parse(format!("missing 0x prefix in hex real '{s}'")))?;

    let (digits, exp_str) = body
        .split_once(['p', 'P'])
        .ok_or_else(|| Error::Parse(format!("missing exponent in hex real '{s}'")))?;
    let exp: i32 = exp_str
        .parse()
        .map_err(|_| Error::Parse(format!("bad exponent in hex real '{s}'")))?;

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };

    let mut total: u128 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        let d = c
            .to_digit(16)
            .ok_or_else(|| Error::Parse(format!("bad hex digit '{c}' in '{s}'")))?;
        total = total
            .checked_mul(16)
            .and_then(|t| t.checked_add(d as u128))
            .ok_or_else(|| Error::Parse(format!("hex real '{s}' out of range")))?;
    }

    let scale = exp - 4 * frac_part.len() as i32;
    let mut val = total as f64;
    // Split the scaling so extreme exponents do not overflow the first step.
    let mut remaining = scale;
    while remaining > 512 {
        val *= 2f64.powi(512);
        remaining -= 512;
    }
    while remaining < -512 {
        val *= 2f64.powi(-512);
        remaining += 512;
    }
    val *= 2f64.powi(remaining);

    Ok(if neg { -val } else { val })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_same_tags() {
        assert_eq!(
            Value::Int(3).compare(&Value::Int(5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Real(2.5).compare(&Value::Real(2.5)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Str(4).compare(&Value::Str(1)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn compare_across_tags_is_none() {
        assert_eq!(Value::Int(1).compare(&Value::Real(1.0)), None);
        assert_eq!(Value::Real(0.0).compare(&Value::Str(0)), None);
    }

    #[test]
    fn hex_real_known_values() {
        assert_eq!(format_hex_real(1.5), "0x1.8p+0");
        assert_eq!(format_hex_real(3.0), "0x1.8p+1");
        assert_eq!(format_hex_real(0.0), "0x0p+0");
        assert_eq!(format_hex_real(-2.0), "-0x1p+1");
        assert_eq!(format_hex_real(f64::INFINITY), "inf");
    }

    #[test]
    fn hex_real_round_trip() {
        let samples = [
            0.0,
            1.0,
            -1.0,
            0.1,
            std::f64::consts::PI,
            1e-300,
            1e300,
            f64::MIN_POSITIVE,
            // A subnormal.
            f64::MIN_POSITIVE / 4.0,
            f64::MAX,
            -123.456789,
        ];
        for v in samples {
            let text = format_hex_real(v);
            let back = parse_hex_real(&text).unwrap();
            assert_eq!(v.to_bits(), back.to_bits(), "round trip failed for {text}");
        }
    }

    #[test]
    fn hex_real_parse_errors() {
        assert!(parse_hex_real("1.5").is_err());
        assert!(parse_hex_real("0x1.8").is_err());
        assert!(parse_hex_real("0xzp+0").is_err());
    }
}
