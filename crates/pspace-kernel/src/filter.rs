//! Subspace selection over an expanded parameter space.
//!
//! A constraint string is a comma-separated list of `NAME=VALUE` pairs:
//!
//! - `J=1` selects sets whose `J` equals 1,
//! - `J=3:8` selects `3 <= J <= 8`,
//! - `J=7:` and `J=:5` leave one side open.
//!
//! Exact matches compare canonical decimal strings by default, so `J=1` and
//! `J=1.0` match a value of `1.0`, but `J=0.30000000000000004` is needed to
//! select `0.1 + 0.2`. [`MatchMode::Numeric`] compares with a relative
//! tolerance instead.

use std::fmt;

use pspace_types::{canonical_float, ParameterSet};
use thiserror::Error;

use crate::expand::ParameterSpace;

/// Relative tolerance of [`MatchMode::Numeric`].
pub const NUMERIC_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("bad NAME=VALUE pair {0:?}")]
    BadPair(String),
    #[error("double definition of parameter {0:?}")]
    Duplicate(String),
    #[error("undeclared parameter {0:?}")]
    Undeclared(String),
    #[error("bad interval definition {0:?}")]
    BadInterval(String),
    #[error("bad value {0:?}")]
    BadValue(String),
}

/// How exact constraints compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Compare canonical decimal strings.
    #[default]
    Canonical,
    /// Compare numbers within [`NUMERIC_TOLERANCE`].
    Numeric,
}

/// Restriction on one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    Exact(f64),
    /// Closed interval; `None` leaves that side unbounded.
    Interval(Option<f64>, Option<f64>),
}

impl Constraint {
    pub fn admits(&self, value: f64, mode: MatchMode) -> bool {
        match (self, mode) {
            (Constraint::Exact(want), MatchMode::Canonical) => {
                canonical_float(value) == canonical_float(*want)
            }
            (Constraint::Exact(want), MatchMode::Numeric) => {
                let scale = value.abs().max(want.abs()).max(f64::MIN_POSITIVE);
                (value - want).abs() <= NUMERIC_TOLERANCE * scale
            }
            (Constraint::Interval(lo, hi), _) => {
                lo.map_or(true, |lo| value >= lo) && hi.map_or(true, |hi| value <= hi)
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: &Option<f64>| v.map(canonical_float).unwrap_or_default();
        match self {
            Constraint::Exact(v) => write!(f, "{}", canonical_float(*v)),
            Constraint::Interval(lo, hi) => write!(f, "{}:{}", side(lo), side(hi)),
        }
    }
}

/// A parsed constraint string: parse once, test many parameter sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subspace {
    constraints: Vec<(String, Constraint)>,
    mode: MatchMode,
}

impl Subspace {
    /// Parse a constraint string.
    ///
    /// Every name must appear in `declared`; an empty `declared` list
    /// disables that check.
    pub fn parse(text: &str, declared: &[String]) -> Result<Subspace, FilterError> {
        let mut constraints: Vec<(String, Constraint)> = Vec::new();

        for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut parts = pair.split('=');
            let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(FilterError::BadPair(pair.to_string()));
            };
            let (name, value) = (name.trim(), value.trim());

            if constraints.iter().any(|(n, _)| n == name) {
                return Err(FilterError::Duplicate(name.to_string()));
            }
            if !declared.is_empty() && !declared.iter().any(|d| d == name) {
                return Err(FilterError::Undeclared(name.to_string()));
            }

            let constraint = match value.split_once(':') {
                Some((lo, hi)) => {
                    if hi.contains(':') {
                        return Err(FilterError::BadInterval(value.to_string()));
                    }
                    Constraint::Interval(bound(lo)?, bound(hi)?)
                }
                None => Constraint::Exact(number(value)?),
            };
            constraints.push((name.to_string(), constraint));
        }

        Ok(Subspace {
            constraints,
            mode: MatchMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraints(&self) -> &[(String, Constraint)] {
        &self.constraints
    }

    /// Whether a parameter set satisfies every constraint.
    ///
    /// A set lacking a constrained parameter never matches.
    pub fn contains(&self, pset: &ParameterSet) -> bool {
        self.constraints.iter().all(|(name, constraint)| {
            pset.get(name)
                .is_some_and(|value| constraint.admits(value, self.mode))
        })
    }

    /// The surviving subset.
    pub fn apply(&self, psets: &ParameterSpace) -> ParameterSpace {
        psets
            .iter()
            .filter(|(_, pset)| self.contains(pset))
            .map(|(key, pset)| (key.clone(), pset.clone()))
            .collect()
    }
}

fn number(text: &str) -> Result<f64, FilterError> {
    text.parse()
        .map_err(|_| FilterError::BadValue(text.to_string()))
}

fn bound(text: &str) -> Result<Option<f64>, FilterError> {
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        number(text).map(Some)
    }
}

/// Parse `constraints` and keep the parameter sets inside the subspace.
pub fn filter(
    psets: &ParameterSpace,
    constraints: &str,
    declared: &[String],
) -> Result<ParameterSpace, FilterError> {
    let subspace = Subspace::parse(constraints, declared)?;
    let out = subspace.apply(psets);
    tracing::debug!(
        constraints,
        before = psets.len(),
        after = out.len(),
        "filtered parameter space"
    );
    Ok(out)
}
