//! Parameter sets: one concrete point of a parameter space.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A named parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
}

/// Datafile identity derived from a parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datafile {
    /// The key: rendered name with the artifact suffix and `~` expanded.
    /// Doubles as the scheduler job name.
    pub key: String,
    /// Rendered name as produced by the template, before `~` expansion.
    pub file: String,
    /// Path relative to the configured working directory.
    pub relpath: PathBuf,
    /// Absolute, lexically normalized path.
    pub abspath: PathBuf,
}

/// One assignment of every declared parameter, plus derived fields.
///
/// Built by the space expander. Values are kept in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    values: Vec<Parameter>,
    accuracy: f64,
    datafile: Option<Datafile>,
}

impl ParameterSet {
    /// A parameter set without datafile identity yet.
    pub fn new(values: Vec<Parameter>, accuracy: f64) -> Self {
        Self {
            values,
            accuracy,
            datafile: None,
        }
    }

    /// Attach the datafile identity.
    pub fn with_datafile(mut self, datafile: Datafile) -> Self {
        self.datafile = Some(datafile);
        self
    }

    /// Value of a parameter by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|p| p.name == name).map(|p| p.value)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.values
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|p| p.name.as_str())
    }

    /// Target accuracy copied from the originating block.
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn datafile(&self) -> Option<&Datafile> {
        self.datafile.as_ref()
    }

    /// The key, or an empty string before the datafile was attached.
    pub fn key(&self) -> &str {
        self.datafile.as_ref().map_or("", |d| d.key.as_str())
    }

    pub fn abspath(&self) -> Option<&Path> {
        self.datafile.as_ref().map(|d| d.abspath.as_path())
    }

    pub fn relpath(&self) -> Option<&Path> {
        self.datafile.as_ref().map(|d| d.relpath.as_path())
    }

    /// Resolve a name the way expressions see it.
    ///
    /// Parameters first, then the derived fields `ACC`, `FILE`, `RELPATH` and
    /// `ABSPATH` (the last three only once a datafile is attached).
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.get(name) {
            return Some(Value::Float(v));
        }
        match name {
            "ACC" => Some(Value::Float(self.accuracy)),
            "FILE" => self.datafile.as_ref().map(|d| Value::String(d.file.clone())),
            "RELPATH" => self
                .datafile
                .as_ref()
                .map(|d| Value::String(d.relpath.display().to_string())),
            "ABSPATH" => self
                .datafile
                .as_ref()
                .map(|d| Value::String(d.abspath.display().to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pset() -> ParameterSet {
        ParameterSet::new(
            vec![
                Parameter { name: "J".into(), value: 1.0 },
                Parameter { name: "L".into(), value: 8.0 },
            ],
            1e-4,
        )
    }

    #[test]
    fn get_by_name() {
        let p = pset();
        assert_eq!(p.get("J"), Some(1.0));
        assert_eq!(p.get("L"), Some(8.0));
        assert_eq!(p.get("W"), None);
        assert_eq!(p.names().collect::<Vec<_>>(), vec!["J", "L"]);
    }

    #[test]
    fn lookup_derived_fields() {
        let p = pset().with_datafile(Datafile {
            key: "J1_L8.h5".into(),
            file: "J1_L8.h5".into(),
            relpath: PathBuf::from("J1_L8.h5"),
            abspath: PathBuf::from("/work/J1_L8.h5"),
        });
        assert_eq!(p.lookup("ACC"), Some(Value::Float(1e-4)));
        assert_eq!(p.lookup("FILE"), Some(Value::from("J1_L8.h5")));
        assert_eq!(p.lookup("ABSPATH"), Some(Value::from("/work/J1_L8.h5")));
        assert_eq!(p.key(), "J1_L8.h5");
    }

    #[test]
    fn lookup_before_datafile() {
        let p = pset();
        assert_eq!(p.lookup("J"), Some(Value::Float(1.0)));
        assert_eq!(p.lookup("FILE"), None);
        assert_eq!(p.key(), "");
    }
}
