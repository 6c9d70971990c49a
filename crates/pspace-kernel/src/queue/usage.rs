//! Per-owner and per-queue tallies.

use std::collections::{BTreeMap, BTreeSet};

use pspace_types::{JobRecord, JobState};
use serde::Serialize;

/// Jobs of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OwnerUsage {
    /// First component of the owner's host, uppercased.
    pub project: String,
    pub total: usize,
    pub running: usize,
    pub queued: usize,
    pub queues: BTreeSet<String>,
}

/// Jobs in one queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueUsage {
    pub total: usize,
    pub running: usize,
    pub queued: usize,
    pub users: BTreeSet<String>,
}

/// Project label from an owner host such as `login1.cluster` (`LOGIN1`).
pub fn project_of(host: &str) -> String {
    host.split('.').next().unwrap_or_default().to_uppercase()
}

fn tally(state: Option<JobState>, running: &mut usize, queued: &mut usize) {
    match state {
        Some(JobState::Running) => *running += 1,
        Some(JobState::Queued) => *queued += 1,
        _ => {}
    }
}

pub(crate) fn by_owner<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> BTreeMap<String, OwnerUsage> {
    let mut out: BTreeMap<String, OwnerUsage> = BTreeMap::new();
    for rec in records {
        let usage = out.entry(rec.user().to_string()).or_insert_with(|| OwnerUsage {
            project: project_of(rec.owner_host()),
            ..OwnerUsage::default()
        });
        usage.total += 1;
        tally(rec.state(), &mut usage.running, &mut usage.queued);
        usage.queues.insert(rec.queue().to_string());
    }
    out
}

pub(crate) fn by_queue<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> BTreeMap<String, QueueUsage> {
    let mut out: BTreeMap<String, QueueUsage> = BTreeMap::new();
    for rec in records {
        let usage = out.entry(rec.queue().to_string()).or_default();
        usage.total += 1;
        tally(rec.state(), &mut usage.running, &mut usage.queued);
        usage.users.insert(rec.user().to_string());
    }
    out
}
