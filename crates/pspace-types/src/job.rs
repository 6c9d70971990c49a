//! Scheduler job identification, state codes and records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Scheduler job identifier, e.g. `1234.master.cluster`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part before the first dot, if any.
    pub fn number(&self) -> Option<u64> {
        self.0.split('.').next().and_then(|n| n.parse().ok())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

/// Single-character PBS job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// `R`: running.
    Running,
    /// `Q`: queued, eligible to run.
    Queued,
    /// `C`: completed.
    Completed,
    /// `E`: exiting after having run.
    Exiting,
    /// `H`: held.
    Held,
    /// `T`: being moved to a new location.
    Transit,
    /// `W`: waiting for its execution time.
    Waiting,
    /// `S`: suspended.
    Suspended,
}

impl JobState {
    /// Every state, in `R Q C E H T W S` order.
    pub const ALL: [JobState; 8] = [
        JobState::Running,
        JobState::Queued,
        JobState::Completed,
        JobState::Exiting,
        JobState::Held,
        JobState::Transit,
        JobState::Waiting,
        JobState::Suspended,
    ];

    pub fn code(&self) -> char {
        match self {
            JobState::Running => 'R',
            JobState::Queued => 'Q',
            JobState::Completed => 'C',
            JobState::Exiting => 'E',
            JobState::Held => 'H',
            JobState::Transit => 'T',
            JobState::Waiting => 'W',
            JobState::Suspended => 'S',
        }
    }

    pub fn from_code(code: char) -> Option<JobState> {
        JobState::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Parse a state attribute; anything but a single known letter is `None`.
    pub fn parse(s: &str) -> Option<JobState> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => JobState::from_code(c),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "Running"),
            JobState::Queued => write!(f, "Queued"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Exiting => write!(f, "Exiting"),
            JobState::Held => write!(f, "Held"),
            JobState::Transit => write!(f, "Transit"),
            JobState::Waiting => write!(f, "Waiting"),
            JobState::Suspended => write!(f, "Suspended"),
        }
    }
}

/// One job as reported by the scheduler.
///
/// `attributes` holds every attribute the status table knows how to type;
/// `unknown` keeps attributes outside that table as raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub unknown: BTreeMap<String, String>,
}

impl JobRecord {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            attributes: BTreeMap::new(),
            unknown: BTreeMap::new(),
        }
    }

    fn text(&self, key: &str) -> &str {
        match self.attributes.get(key) {
            Some(Value::String(s)) => s,
            _ => "",
        }
    }

    /// `Job_Name`: for pspace jobs, the datafile key.
    pub fn name(&self) -> &str {
        self.text("Job_Name")
    }

    /// `Job_Owner`, typically `user@host`.
    pub fn owner(&self) -> &str {
        self.text("Job_Owner")
    }

    /// User part of the owner (before `@`).
    pub fn user(&self) -> &str {
        let owner = self.owner();
        owner.split_once('@').map_or(owner, |(user, _)| user)
    }

    /// Host part of the owner (after `@`), empty if absent.
    pub fn owner_host(&self) -> &str {
        self.owner().split_once('@').map_or("", |(_, host)| host)
    }

    pub fn queue(&self) -> &str {
        self.text("queue")
    }

    /// Raw `job_state` text.
    pub fn state_code(&self) -> &str {
        self.text("job_state")
    }

    /// Parsed `job_state`, `None` for empty or unknown codes.
    pub fn state(&self) -> Option<JobState> {
        JobState::parse(self.state_code())
    }

    /// Typed attribute, falling back to the raw text of an unknown one.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes
            .get(key)
            .cloned()
            .or_else(|| self.unknown.get(key).map(|raw| Value::String(raw.clone())))
    }
}
