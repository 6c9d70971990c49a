//! Parameter-space configuration: the `pspace.conf` language.
//!
//! A configuration declares parameters, the command templates used to create,
//! run and inspect one job per parameter set, and one or more `PSPACE:`
//! blocks assigning values to every parameter:
//!
//! ```text
//! DECLARE J, L
//! WORKDIR ~/runs
//! DATAFILE data/J%d_L%d
//! DATAFILE_VALUES J*100, L
//! CMD_EXEC run %s
//! CMD_EXEC_VALUES FILE
//! ...
//! PSPACE:
//!     PARAM J 0:1:0.25
//!     PARAM L 8, 16
//!     ACC 1e-6
//! ```
//!
//! Parsing is pure: [`ConfigParser::parse`] takes text plus an explicit origin
//! and home directory. [`Configuration::load`] is the file-reading wrapper.

mod error;
mod parser;
pub mod range;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pspace_types::{CompareOp, ParameterSet};
use serde::{Deserialize, Serialize};

use crate::template::{CommandTemplate, TemplateError};

pub use error::ConfigError;
pub use parser::ConfigParser;

/// Canonical configuration file name.
pub const CONFIG_FILE_NAME: &str = "pspace.conf";

/// One `PSPACE:` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpaceBlock {
    /// Values per parameter name.
    pub values: BTreeMap<String, Vec<f64>>,
    /// Target accuracy, already converted to a plain fraction.
    pub accuracy: f64,
    /// 1-based line of the `PSPACE:` header.
    pub line: usize,
}

impl ParameterSpaceBlock {
    pub fn values_of(&self, name: &str) -> Option<&[f64]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Number of combinations this block spans over `pnames`.
    pub fn combinations(&self, pnames: &[String]) -> usize {
        pnames
            .iter()
            .map(|name| self.values.get(name).map_or(0, Vec::len))
            .product()
    }
}

/// A parsed and validated configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// File the configuration was parsed from.
    pub origin: PathBuf,
    /// Home directory used for `~` expansion.
    pub home: PathBuf,
    /// Declared parameter names, in declaration order.
    pub pnames: Vec<String>,
    /// `WORKDIR` as written; empty when it defaulted to the home directory.
    pub workdir_raw: String,
    /// Absolute, normalized working directory.
    pub workdir: PathBuf,
    /// Maximum number of concurrently queued or running jobs.
    pub maxrun: Option<u32>,
    /// `DATAFILE` / `DATAFILE_VALUES`.
    pub datafile: CommandTemplate,
    /// `CMD_EXEC` / `CMD_EXEC_VALUES`.
    pub exec: CommandTemplate,
    /// `CMD_FILE` / `CMD_FILE_VALUES`.
    pub create: CommandTemplate,
    /// `CMD_CHECKFILE` / `CMD_CHECKFILE_VALUES`.
    pub check: CommandTemplate,
    /// `CMD_ACC` / `CMD_ACC_VALUES`.
    pub acc: CommandTemplate,
    /// `CMD_ACC_OP`.
    pub op: CompareOp,
    pub blocks: Vec<ParameterSpaceBlock>,
}

impl Configuration {
    /// Locate, read and parse a configuration.
    ///
    /// `path` may be the file itself or the directory containing it.
    pub fn load(path: impl AsRef<Path>) -> Result<Configuration, ConfigError> {
        let file = ConfigParser::locate(path.as_ref())?;
        let text = std::fs::read_to_string(&file).map_err(|source| ConfigError::Io {
            path: file.clone(),
            source,
        })?;
        ConfigParser::new(file).parse(&text)
    }

    /// Directory containing the configuration file.
    pub fn confdir(&self) -> &Path {
        self.origin.parent().unwrap_or(Path::new("/"))
    }

    /// Command running the job for a parameter set.
    pub fn render_exec(&self, pset: &ParameterSet) -> Result<String, TemplateError> {
        self.exec.render(pset)
    }

    /// Command creating the datafile of a parameter set.
    pub fn render_create(&self, pset: &ParameterSet) -> Result<String, TemplateError> {
        self.create.render(pset)
    }

    /// Command checking datafile integrity.
    pub fn render_check(&self, pset: &ParameterSet) -> Result<String, TemplateError> {
        self.check.render(pset)
    }

    /// Command printing the accuracy reached so far.
    pub fn render_acc(&self, pset: &ParameterSet) -> Result<String, TemplateError> {
        self.acc.render(pset)
    }

    /// Whether a measured accuracy satisfies `target` under `CMD_ACC_OP`.
    ///
    /// A missing measurement is never done.
    pub fn target_reached(&self, measured: Option<f64>, target: f64) -> bool {
        measured.is_some_and(|m| self.op.holds(m, target))
    }

    /// How many more jobs may be submitted while `running` are active.
    ///
    /// `None` means unlimited.
    pub fn submit_headroom(&self, running: usize) -> Option<usize> {
        self.maxrun
            .map(|max| (max as usize).saturating_sub(running))
    }
}
