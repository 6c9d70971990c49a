//! The plain `qstat` table.
//!
//! ```text
//! Job ID                    Name             User            Time Use S Queue
//! ------------------------- ---------------- --------------- -------- - -----
//! 1234.master               J1_L8.h5         alice           00:10:02 R batch
//! ```

use pspace_types::{JobId, JobState};
use serde::{Deserialize, Serialize};

use super::QueueError;

/// One row of the brief table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefJob {
    pub id: JobId,
    /// Numeric part of the id, when the id has a host part.
    pub number: Option<u64>,
    /// Host component following the first dot of the id.
    pub host: Option<String>,
    pub name: String,
    pub user: String,
    pub time_used: String,
    pub state: String,
    pub queue: String,
}

impl BriefJob {
    pub fn state(&self) -> Option<JobState> {
        JobState::parse(&self.state)
    }
}

/// Parse the brief table. Header and separator lines are skipped.
pub fn parse_brief(text: &str) -> Result<Vec<BriefJob>, QueueError> {
    let mut jobs = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = words.first() else {
            continue;
        };
        if *first == "Job" || first.starts_with("--") {
            continue;
        }
        let [id, name, user, time_used, state, queue] = words.as_slice() else {
            return Err(QueueError::MalformedRow {
                line: index + 1,
                text: line.trim().to_string(),
            });
        };

        let (number, host) = match id.split_once('.') {
            Some((number, rest)) => (
                number.parse().ok(),
                rest.split('.').next().map(str::to_string),
            ),
            None => (None, None),
        };
        jobs.push(BriefJob {
            id: JobId::from(*id),
            number,
            host,
            name: name.to_string(),
            user: user.to_string(),
            time_used: time_used.to_string(),
            state: state.to_string(),
            queue: queue.to_string(),
        });
    }
    Ok(jobs)
}
