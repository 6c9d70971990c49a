//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be located, read or parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A malformed line. Reported as soon as it is seen.
    #[error("{}:{line}: {message}", file.display())]
    Syntax {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// A whole-file consistency check that failed after parsing.
    #[error("{}{}: {message}", file.display(), line.map(|l| format!(":{l}")).unwrap_or_default())]
    Semantic {
        file: PathBuf,
        line: Option<usize>,
        message: String,
    },

    /// The path does not name a configuration file.
    #[error("{}: {reason}", path.display())]
    Locate { path: PathBuf, reason: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// 1-based line the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Syntax { line, .. } => Some(*line),
            ConfigError::Semantic { line, .. } => *line,
            _ => None,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, ConfigError::Syntax { .. })
    }
}
