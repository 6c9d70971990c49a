//! Scheduler status snapshots.
//!
//! A [`QueueSnapshot`] is parsed from `qstat -f1` output:
//!
//! ```text
//! Job Id: 1234.master.cluster
//!     Job_Name = J1_L8.h5
//!     Job_Owner = alice@login1.cluster
//!     job_state = R
//!     queue = batch
//! ```
//!
//! Records keep dump order. Jobs submitted for a parameter set carry its key
//! as `Job_Name`, which is how snapshots are reconciled with an expanded
//! parameter space.

mod attributes;
mod brief;
mod usage;

use std::collections::{BTreeMap, HashMap, HashSet};

use pspace_types::{JobId, JobRecord, JobState};
use thiserror::Error;

use crate::expand::ParameterSpace;

pub use attributes::{attribute_type, AttributeType, KNOWN_ATTRIBUTES};
pub use brief::{parse_brief, BriefJob};
pub use usage::{project_of, OwnerUsage, QueueUsage};

/// Marker starting a record.
const RECORD_MARKER: &str = "Job Id:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("line {line}: attribute before any \"Job Id:\" line")]
    AttributeBeforeRecord { line: usize },
    #[error("line {line}: \"Job Id:\" without a job identifier")]
    MissingJobId { line: usize },
    #[error("line {line}: expected KEY = VALUE, got {text:?}")]
    MalformedAttribute { line: usize, text: String },
    #[error("line {line}: invalid {expected} {value:?} for {key}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error("line {line}: expected six columns, got {text:?}")]
    MalformedRow { line: usize, text: String },
}

/// Jobs known to the scheduler at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    records: Vec<JobRecord>,
    index: HashMap<JobId, usize>,
}

impl QueueSnapshot {
    /// Parse `qstat -f1` output.
    pub fn parse(dump: &str) -> Result<QueueSnapshot, QueueError> {
        let mut snapshot = QueueSnapshot::default();
        let mut current: Option<usize> = None;

        for (index, raw) in dump.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }

            if let Some(rest) = text.strip_prefix(RECORD_MARKER) {
                let id = rest
                    .split_whitespace()
                    .last()
                    .ok_or(QueueError::MissingJobId { line })?;
                current = Some(snapshot.insert(new_record(JobId::from(id))));
                continue;
            }

            let Some(position) = current else {
                return Err(QueueError::AttributeBeforeRecord { line });
            };
            let Some((key, value)) = text.split_once('=') else {
                return Err(QueueError::MalformedAttribute {
                    line,
                    text: text.to_string(),
                });
            };
            let (key, value) = (key.trim(), value.trim());
            let record = &mut snapshot.records[position];

            match attribute_type(key) {
                Some(ty) => {
                    let typed = ty.parse(value).ok_or_else(|| QueueError::InvalidValue {
                        line,
                        key: key.to_string(),
                        value: value.to_string(),
                        expected: ty.name(),
                    })?;
                    record.attributes.insert(key.to_string(), typed);
                }
                None => {
                    tracing::warn!(line, key, job = %record.id, "unknown qstat attribute");
                    record.unknown.insert(key.to_string(), value.to_string());
                }
            }
        }

        tracing::debug!(jobs = snapshot.len(), "parsed queue snapshot");
        Ok(snapshot)
    }

    /// Build a snapshot from records; a repeated id replaces the earlier record.
    pub fn from_records(records: impl IntoIterator<Item = JobRecord>) -> QueueSnapshot {
        let mut snapshot = QueueSnapshot::default();
        for record in records {
            snapshot.insert(record);
        }
        snapshot
    }

    /// Insert or replace in place, returning the record's position.
    fn insert(&mut self, record: JobRecord) -> usize {
        match self.index.get(&record.id) {
            Some(&position) => {
                self.records[position] = record;
                position
            }
            None => {
                let position = self.records.len();
                self.index.insert(record.id.clone(), position);
                self.records.push(record);
                position
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &JobId) -> Option<&JobRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Records in dump order.
    pub fn iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.records.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &JobId> {
        self.records.iter().map(|r| &r.id)
    }

    /// First record in dump order whose `Job_Name` is `name`.
    pub fn by_name(&self, name: &str) -> Option<&JobRecord> {
        self.records.iter().find(|r| r.name() == name)
    }

    /// Jobs per state, every state present. Unknown codes are not counted.
    pub fn count_by_state(&self) -> BTreeMap<JobState, usize> {
        count_by_state(&self.records)
    }

    /// Jobs owned by `user`, given either as `user` or as `user@host`.
    pub fn filter_by_owner(&self, user: &str) -> QueueSnapshot {
        QueueSnapshot::from_records(
            self.records
                .iter()
                .filter(|r| r.owner() == user || r.user() == user)
                .cloned(),
        )
    }

    /// Job names present in the snapshot.
    pub fn job_names(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.name()).collect()
    }

    /// Number of parameter-set keys that have a job.
    pub fn count_matching(&self, psets: &ParameterSpace) -> usize {
        let names = self.job_names();
        psets.keys().filter(|key| names.contains(key.as_str())).count()
    }

    /// Jobs whose name is a key of `psets`.
    pub fn restrict_to(&self, psets: &ParameterSpace) -> QueueSnapshot {
        QueueSnapshot::from_records(
            self.records
                .iter()
                .filter(|r| psets.contains_key(r.name()))
                .cloned(),
        )
    }

    /// Per-user tallies, sorted by user.
    pub fn usage_by_owner(&self) -> BTreeMap<String, OwnerUsage> {
        usage::by_owner(&self.records)
    }

    /// Per-queue tallies, sorted by queue.
    pub fn usage_by_queue(&self) -> BTreeMap<String, QueueUsage> {
        usage::by_queue(&self.records)
    }
}

impl<'a> IntoIterator for &'a QueueSnapshot {
    type Item = &'a JobRecord;
    type IntoIter = std::slice::Iter<'a, JobRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// A record with every known attribute at its default.
fn new_record(id: JobId) -> JobRecord {
    let mut record = JobRecord::new(id);
    for (name, ty) in KNOWN_ATTRIBUTES {
        record.attributes.insert(name.to_string(), ty.default_value());
    }
    record
}

/// Tally records by state over all eight codes.
pub fn count_by_state<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> BTreeMap<JobState, usize> {
    let mut counts: BTreeMap<JobState, usize> = JobState::ALL.iter().map(|s| (*s, 0)).collect();
    for state in records.into_iter().filter_map(|r| r.state()) {
        *counts.entry(state).or_default() += 1;
    }
    counts
}
