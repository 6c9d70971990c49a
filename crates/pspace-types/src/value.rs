//! Scalar values flowing through expressions, templates and job attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar value.
///
/// Parameter values are always `Float`. Integer literals in expressions stay
/// `Int` until they meet a float, mirroring the promotion rules users expect
/// from the expression language (`2 * J` is a float, `round(J)` is an int).
/// `String` carries derived text such as a parameter set's datafile name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Numeric view of the value, `None` for strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::String(_))
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
        }
    }

    /// Quoted representation: strings in single quotes, everything else as displayed.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", canonical_float(*x)),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Canonical decimal rendering of a float.
///
/// Shortest digits that round-trip, always with a decimal point or exponent:
/// `1.0`, `0.25`, `1e-06`, `1.5e+16`. Fixed notation is used for decimal
/// exponents in `-4..16`, scientific notation with a signed two-digit exponent
/// outside that window. This is the string form used in datafile names and by
/// exact subspace constraints.
pub fn canonical_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    // `{:e}` yields the shortest round-trip mantissa, e.g. "1.5e-7"
    let sci = format!("{:e}", x);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if (-4..16).contains(&exp) {
        let fixed = format!("{}", x);
        if fixed.contains('.') {
            fixed
        } else {
            format!("{}.0", fixed)
        }
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_whole_numbers_keep_point() {
        assert_eq!(canonical_float(1.0), "1.0");
        assert_eq!(canonical_float(-3.0), "-3.0");
        assert_eq!(canonical_float(1e15), "1000000000000000.0");
    }

    #[test]
    fn canonical_fractions() {
        assert_eq!(canonical_float(0.25), "0.25");
        assert_eq!(canonical_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(canonical_float(0.0001), "0.0001");
    }

    #[test]
    fn canonical_scientific() {
        assert_eq!(canonical_float(1e-6), "1e-06");
        assert_eq!(canonical_float(1.5e-7), "1.5e-07");
        assert_eq!(canonical_float(1e16), "1e+16");
        assert_eq!(canonical_float(-2.5e100), "-2.5e+100");
    }

    #[test]
    fn canonical_specials() {
        assert_eq!(canonical_float(0.0), "0.0");
        assert_eq!(canonical_float(-0.0), "-0.0");
        assert_eq!(canonical_float(f64::INFINITY), "inf");
        assert_eq!(canonical_float(f64::NAN), "nan");
    }

    #[test]
    fn display_follows_value_kind() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Float(7.0).to_string(), "7.0");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::from("data/a.h5").to_string(), "data/a.h5");
    }

    #[test]
    fn repr_quotes_strings_only() {
        assert_eq!(Value::from("it's").repr(), "'it\\'s'");
        assert_eq!(Value::Float(0.5).repr(), "0.5");
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&vec![Value::Int(1), Value::Float(0.5), Value::from("x")])
            .expect("serialize");
        assert_eq!(json, r#"[1,0.5,"x"]"#);
    }
}
