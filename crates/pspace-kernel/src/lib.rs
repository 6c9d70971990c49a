//! pspace-kernel: the core of the parameter-space manager.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes value expressions using logos
//! - **Arithmetic**: Restricted evaluator for `*_VALUES` expressions
//! - **Template**: printf-style `%` substitution for commands and datafile names
//! - **Config**: The `pspace.conf` parser and the resulting `Configuration`
//! - **Expand**: Cartesian expansion of blocks into keyed parameter sets
//! - **Filter**: Subspace selection by `NAME=VALUE` constraints
//! - **Queue**: `qstat` snapshots and reconciliation with parameter sets
//! - **Paths**: Home directory and lexical path helpers
//!
//! Nothing here spawns processes or talks to the scheduler; callers feed in
//! configuration text and status dumps and act on the results.

pub mod arithmetic;
pub mod config;
pub mod expand;
pub mod filter;
pub mod lexer;
pub mod paths;
pub mod queue;
pub mod template;

pub use arithmetic::{EvalError, Expr};
pub use config::{ConfigError, ConfigParser, Configuration, ParameterSpaceBlock, CONFIG_FILE_NAME};
pub use expand::{cardinality, expand, sorted_by_parameter, ExpandError, ParameterSpace};
pub use filter::{filter, Constraint, FilterError, MatchMode, Subspace};
pub use queue::{count_by_state, parse_brief, BriefJob, QueueError, QueueSnapshot};
pub use template::{CommandTemplate, TemplateError};

// Data types, for callers that only depend on the kernel
pub use pspace_types::{
    CompareOp, Datafile, JobId, JobRecord, JobState, Parameter, ParameterSet, Value,
};
