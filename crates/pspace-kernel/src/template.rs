//! printf-style `%` substitution for command and datafile templates.
//!
//! Templates take their arguments positionally from the values of the
//! matching `*_VALUES` expressions. Supported conversions: `%s %r %d %i %u
//! %f %F %e %E %g %G %x %X %o %c` and the literal `%%`. Flags `- + 0 # space`,
//! a field width and a `.precision` are honoured; length modifiers (`h l L`)
//! are accepted and ignored.

use pspace_types::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arithmetic::{Bindings, EvalError, Expr};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("not enough arguments for template {0:?}")]
    NotEnoughArguments(String),
    #[error("not all arguments converted in template {0:?}")]
    TooManyArguments(String),
    #[error("incomplete format in template {0:?}")]
    IncompleteFormat(String),
    #[error("unsupported format character {conversion:?} in template {template:?}")]
    UnsupportedConversion { conversion: char, template: String },
    #[error("%{conversion} format: a number is required, not {type_name}")]
    NumberRequired { conversion: char, type_name: &'static str },
    #[error("%{conversion} format: an integer is required, not {type_name}")]
    IntegerRequired { conversion: char, type_name: &'static str },
    #[error("%c requires an int or a single character")]
    BadCharacter,
    #[error("evaluating {expr:?}: {source}")]
    Eval {
        expr: String,
        #[source]
        source: EvalError,
    },
}

/// A template paired with the expressions that fill it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub template: String,
    pub values: Vec<Expr>,
}

impl CommandTemplate {
    pub fn new(template: impl Into<String>, values: Vec<Expr>) -> Self {
        Self {
            template: template.into(),
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    /// Evaluate every expression against the binding.
    pub fn arguments(&self, bindings: &dyn Bindings) -> Result<Vec<Value>, TemplateError> {
        self.values
            .iter()
            .map(|expr| {
                expr.eval(bindings).map_err(|source| TemplateError::Eval {
                    expr: expr.source().to_string(),
                    source,
                })
            })
            .collect()
    }

    /// Evaluate the expressions and substitute them into the template.
    pub fn render(&self, bindings: &dyn Bindings) -> Result<String, TemplateError> {
        let args = self.arguments(bindings)?;
        format_template(&self.template, &args)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
}

/// Substitute `args` into `template`, consuming them left to right.
///
/// # Example
/// ```
/// use pspace_kernel::template::format_template;
/// use pspace_types::Value;
///
/// let out = format_template("J%d_L%03d", &[Value::Int(1), Value::Int(8)]).unwrap();
/// assert_eq!(out, "J1_L008");
/// ```
pub fn format_template(template: &str, args: &[Value]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut args = args.iter();
    let incomplete = || TemplateError::IncompleteFormat(template.to_string());

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        loop {
            match chars.peek() {
                Some('-') => spec.left = true,
                Some('+') => spec.plus = true,
                Some(' ') => spec.space = true,
                Some('0') => spec.zero = true,
                Some('#') => spec.alt = true,
                _ => break,
            }
            chars.next();
        }
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            spec.width = push_digit(spec.width, d).ok_or_else(incomplete)?;
            chars.next();
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut precision = 0;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                precision = push_digit(precision, d).ok_or_else(incomplete)?;
                chars.next();
            }
            spec.precision = Some(precision);
        }
        while matches!(chars.peek(), Some('h' | 'l' | 'L')) {
            chars.next();
        }

        let conversion = chars.next().ok_or_else(incomplete)?;
        if conversion == '%' {
            out.push('%');
            continue;
        }
        if !"srdiufFeEgGxXoc".contains(conversion) {
            return Err(TemplateError::UnsupportedConversion {
                conversion,
                template: template.to_string(),
            });
        }

        let arg = args
            .next()
            .ok_or_else(|| TemplateError::NotEnoughArguments(template.to_string()))?;
        out.push_str(&convert(conversion, &spec, arg)?);
    }

    if args.next().is_some() {
        return Err(TemplateError::TooManyArguments(template.to_string()));
    }
    Ok(out)
}

/// Most columns a single width or precision may request.
const MAX_FIELD_WIDTH: usize = 1 << 20;

fn push_digit(acc: usize, digit: u32) -> Option<usize> {
    acc.checked_mul(10)
        .and_then(|n| n.checked_add(digit as usize))
        .filter(|&n| n <= MAX_FIELD_WIDTH)
}

fn convert(conversion: char, spec: &Spec, arg: &Value) -> Result<String, TemplateError> {
    match conversion {
        's' | 'r' => {
            let mut text = if conversion == 's' { arg.to_string() } else { arg.repr() };
            if let Some(p) = spec.precision {
                text = text.chars().take(p).collect();
            }
            Ok(pad(String::new(), text, spec, false))
        }
        'c' => {
            let ch = match arg {
                Value::Int(i) => u32::try_from(*i).ok().and_then(char::from_u32),
                Value::String(s) if s.chars().count() == 1 => s.chars().next(),
                _ => None,
            }
            .ok_or(TemplateError::BadCharacter)?;
            Ok(pad(String::new(), ch.to_string(), spec, false))
        }
        'd' | 'i' | 'u' => {
            let (negative, mut digits) = match arg {
                Value::Bool(b) => (false, u8::from(*b).to_string()),
                Value::Int(i) => (*i < 0, i.unsigned_abs().to_string()),
                // exact decimal digits of the truncated value
                Value::Float(x) if x.is_finite() => {
                    let t = x.trunc();
                    (t < 0.0, format!("{:.0}", t.abs()))
                }
                Value::Float(x) => return Ok(pad(sign(spec, *x < 0.0), nonfinite(*x), spec, false)),
                Value::String(_) => {
                    return Err(TemplateError::NumberRequired {
                        conversion,
                        type_name: arg.type_name(),
                    })
                }
            };
            if let Some(p) = spec.precision {
                digits = format!("{:0>width$}", digits, width = p);
            }
            Ok(pad(sign(spec, negative), digits, spec, true))
        }
        'x' | 'X' | 'o' => {
            let n = match arg {
                Value::Bool(b) => *b as i64,
                Value::Int(i) => *i,
                _ => {
                    return Err(TemplateError::IntegerRequired {
                        conversion,
                        type_name: arg.type_name(),
                    })
                }
            };
            let magnitude = n.unsigned_abs();
            let (digits, prefix) = match conversion {
                'x' => (format!("{:x}", magnitude), "0x"),
                'X' => (format!("{:X}", magnitude), "0X"),
                _ => (format!("{:o}", magnitude), "0o"),
            };
            let mut head = sign(spec, n < 0);
            if spec.alt {
                head.push_str(prefix);
            }
            Ok(pad(head, digits, spec, true))
        }
        _ => {
            let x = arg.as_f64().ok_or(TemplateError::NumberRequired {
                conversion,
                type_name: arg.type_name(),
            })?;
            let head = sign(spec, x.is_sign_negative() && !x.is_nan());
            let body = if x.is_finite() {
                let precision = spec.precision.unwrap_or(6);
                match conversion {
                    'f' | 'F' => fixed(x.abs(), precision, spec.alt),
                    'e' | 'E' => scientific(x.abs(), precision, spec.alt),
                    _ => general(x.abs(), precision, spec.alt),
                }
            } else {
                nonfinite(x)
            };
            let body = if conversion.is_ascii_uppercase() {
                body.to_uppercase()
            } else {
                body
            };
            Ok(pad(head, body, spec, x.is_finite()))
        }
    }
}

fn sign(spec: &Spec, negative: bool) -> String {
    if negative {
        "-".to_string()
    } else if spec.plus {
        "+".to_string()
    } else if spec.space {
        " ".to_string()
    } else {
        String::new()
    }
}

fn nonfinite(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else {
        "inf".to_string()
    }
}

/// Apply width: spaces on the left (or right with `-`), zeros after the sign.
fn pad(head: String, body: String, spec: &Spec, numeric: bool) -> String {
    let len = head.chars().count() + body.chars().count();
    if len >= spec.width {
        return head + &body;
    }
    let fill = spec.width - len;
    if spec.left {
        format!("{}{}{}", head, body, " ".repeat(fill))
    } else if spec.zero && numeric {
        format!("{}{}{}", head, "0".repeat(fill), body)
    } else {
        format!("{}{}{}", " ".repeat(fill), head, body)
    }
}

fn fixed(x: f64, precision: usize, alt: bool) -> String {
    let s = format!("{:.*}", precision, x);
    if alt && precision == 0 {
        s + "."
    } else {
        s
    }
}

/// `{:e}` with the exponent written as sign plus at least two digits.
fn scientific(x: f64, precision: usize, alt: bool) -> String {
    let s = format!("{:.*e}", precision, x);
    let (mantissa, exp) = s.split_once('e').unwrap_or((&s, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let dot = if alt && precision == 0 { "." } else { "" };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}{}e{}{:02}", mantissa, dot, sign, exp.abs())
}

/// `%g`: scientific when the exponent is below -4 or at least the precision.
fn general(x: f64, precision: usize, alt: bool) -> String {
    let p = precision.max(1);
    if x == 0.0 {
        return if alt {
            format!("{:.*}", p - 1, 0.0)
        } else {
            "0".to_string()
        };
    }
    let rounded = format!("{:.*e}", p - 1, x);
    let exp: i32 = rounded
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    let s = if exp < -4 || exp >= p as i32 {
        scientific(x, p - 1, alt)
    } else {
        fixed(x, (p as i32 - 1 - exp) as usize, alt)
    };
    if alt {
        return s;
    }
    strip_trailing_zeros(&s)
}

fn strip_trailing_zeros(s: &str) -> String {
    let (mantissa, exp) = match s.find('e') {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{}{}", mantissa, exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn fmt(template: &str, args: &[Value]) -> String {
        format_template(template, args).expect("format should succeed")
    }

    #[rstest]
    #[case::plain_int("%d", Value::Int(42), "42")]
    #[case::float_truncates("%d", Value::Float(-3.9), "-3")]
    #[case::float_truncates_to_zero("%d", Value::Float(-0.5), "0")]
    #[case::float_beyond_i64("%d", Value::Float(1e30), "1000000000000000019884624838656")]
    #[case::negative_float_beyond_i64("%i", Value::Float(-1e19), "-10000000000000000000")]
    #[case::zero_pad("%05d", Value::Int(-42), "-0042")]
    #[case::width("%5d", Value::Int(42), "   42")]
    #[case::left("%-5d|", Value::Int(42), "42   |")]
    #[case::plus("%+d", Value::Int(5), "+5")]
    #[case::precision_int("%.3d", Value::Int(7), "007")]
    #[case::fixed_default("%f", Value::Float(0.5), "0.500000")]
    #[case::fixed_precision("%.2f", Value::Float(3.14159), "3.14")]
    #[case::scientific("%e", Value::Float(1e-6), "1.000000e-06")]
    #[case::scientific_upper("%.1E", Value::Float(12345.0), "1.2E+04")]
    #[case::general_small("%g", Value::Float(1e-6), "1e-06")]
    #[case::general_plain("%g", Value::Float(0.5), "0.5")]
    #[case::general_int("%g", Value::Int(100), "100")]
    #[case::general_large("%g", Value::Float(1234567.0), "1.23457e+06")]
    #[case::string_float("%s", Value::Float(2.0), "2.0")]
    #[case::string_int("%s", Value::Int(2), "2")]
    #[case::repr_string("%r", Value::from("a.h5"), "'a.h5'")]
    #[case::string_precision("%.3s", Value::from("abcdef"), "abc")]
    #[case::hex("%x", Value::Int(255), "ff")]
    #[case::hex_alt("%#X", Value::Int(255), "0XFF")]
    #[case::octal("%o", Value::Int(8), "10")]
    #[case::char_from_int("%c", Value::Int(65), "A")]
    fn conversions(#[case] template: &str, #[case] arg: Value, #[case] expected: &str) {
        assert_eq!(fmt(template, &[arg]), expected);
    }

    #[test]
    fn literal_percent_and_positional_order() {
        assert_eq!(
            fmt("J%d_L%d 100%%", &[Value::Int(1), Value::Int(8)]),
            "J1_L8 100%"
        );
        assert_eq!(fmt("no substitutions", &[]), "no substitutions");
    }

    #[test]
    fn oversized_width_is_incomplete() {
        for template in ["%99999999999999999999d", "%.99999999999999999999f", "%2000000s"] {
            assert_eq!(
                format_template(template, &[Value::Int(1)]),
                Err(TemplateError::IncompleteFormat(template.into()))
            );
        }
        assert_eq!(fmt("%8d", &[Value::Int(1)]), "       1");
    }

    #[test]
    fn argument_count_mismatch() {
        assert_eq!(
            format_template("%d %d", &[Value::Int(1)]),
            Err(TemplateError::NotEnoughArguments("%d %d".into()))
        );
        assert_eq!(
            format_template("%d", &[Value::Int(1), Value::Int(2)]),
            Err(TemplateError::TooManyArguments("%d".into()))
        );
    }

    #[test]
    fn bad_conversions() {
        assert!(matches!(
            format_template("%q", &[Value::Int(1)]),
            Err(TemplateError::UnsupportedConversion { conversion: 'q', .. })
        ));
        assert!(matches!(
            format_template("50%", &[]),
            Err(TemplateError::IncompleteFormat(_))
        ));
        assert!(matches!(
            format_template("%d", &[Value::from("x")]),
            Err(TemplateError::NumberRequired { conversion: 'd', .. })
        ));
        assert!(matches!(
            format_template("%x", &[Value::Float(1.5)]),
            Err(TemplateError::IntegerRequired { conversion: 'x', .. })
        ));
    }

    #[test]
    fn nonfinite_floats() {
        assert_eq!(fmt("%f", &[Value::Float(f64::INFINITY)]), "inf");
        assert_eq!(fmt("%F", &[Value::Float(f64::NEG_INFINITY)]), "-INF");
    }

    #[test]
    fn command_template_renders_against_bindings() {
        use pspace_types::{Parameter, ParameterSet};

        let tpl = CommandTemplate::new(
            "run --j %g --acc %g",
            vec![
                Expr::parse("J").expect("compile"),
                Expr::parse("ACC").expect("compile"),
            ],
        );
        let pset = ParameterSet::new(vec![Parameter { name: "J".into(), value: 0.25 }], 1e-6);
        assert_eq!(tpl.render(&pset).expect("render"), "run --j 0.25 --acc 1e-06");
    }

    #[test]
    fn command_template_reports_failing_expression() {
        let tpl = CommandTemplate::new("%s", vec![Expr::parse("W").expect("compile")]);
        let pset = pspace_types::ParameterSet::new(vec![], 1e-3);
        let err = tpl.render(&pset).expect_err("W is unbound");
        assert_eq!(err.to_string(), "evaluating \"W\": name \"W\" is not defined");
    }
}
