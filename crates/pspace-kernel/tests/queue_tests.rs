//! Queue snapshot tests: parsing `qstat -f1` dumps and reconciling them with
//! expanded parameter spaces.

mod common;

use std::collections::BTreeMap;

use insta::assert_snapshot;
use pspace_kernel::queue::{OwnerUsage, QueueUsage};
use pspace_kernel::{expand, JobId, JobState, QueueError, QueueSnapshot, Value};

use common::{init_tracing, parse};

const DUMP: &str = "\
Job Id: 101.master.cluster
    Job_Name = J1_L8.h5
    Job_Owner = alice@login1.cluster
    job_state = R
    queue = batch
    Priority = 5
    Rerunable = True
    gpu_model = a100
Job Id: 102.master.cluster
    Job_Name = J2_L8.h5
    Job_Owner = alice@login1.cluster
    job_state = Q
    queue = batch
    Variable_List = PBS_O_HOME=/home/alice,PBS_O_SHELL=/bin/bash

Job Id: 103.master.cluster
    Job_Name = relax.sh
    Job_Owner = bob@login2.cluster
    job_state = C
    queue = short
    gpu_model = v100
Job Id: 104.master.cluster
    Job_Name = J3_L8.h5
    Job_Owner = alice@login1.cluster
    job_state = R
    queue = long
";

fn snapshot() -> QueueSnapshot {
    init_tracing();
    QueueSnapshot::parse(DUMP).expect("valid dump")
}

fn names(snapshot: &QueueSnapshot) -> Vec<&str> {
    snapshot.iter().map(|r| r.name()).collect()
}

// =============================================================================
// PARSING
// =============================================================================

#[test]
fn records_keep_dump_order() {
    let snap = snapshot();
    assert_eq!(snap.len(), 4);
    let ids: Vec<&str> = snap.ids().map(JobId::as_str).collect();
    assert_eq!(
        ids,
        vec![
            "101.master.cluster",
            "102.master.cluster",
            "103.master.cluster",
            "104.master.cluster"
        ]
    );
}

#[test]
fn attributes_are_typed() {
    let snap = snapshot();
    let rec = snap.get(&JobId::from("101.master.cluster")).expect("record");
    assert_eq!(rec.attribute("Priority"), Some(Value::Int(5)));
    assert_eq!(rec.attribute("Rerunable"), Some(Value::Bool(true)));
    assert_eq!(rec.user(), "alice");
    assert_eq!(rec.owner_host(), "login1.cluster");
    assert_eq!(rec.state(), Some(JobState::Running));

    let rec = snap.get(&JobId::from("102.master.cluster")).expect("record");
    assert_eq!(rec.attribute("Priority"), Some(Value::Int(0)));
    assert_eq!(
        rec.attribute("Variable_List"),
        Some(Value::from("PBS_O_HOME=/home/alice,PBS_O_SHELL=/bin/bash"))
    );
}

#[test]
fn unknown_attributes_are_kept_raw() {
    let snap = snapshot();
    let rec = snap.get(&JobId::from("103.master.cluster")).expect("record");
    assert_eq!(rec.unknown.get("gpu_model").map(String::as_str), Some("v100"));
    assert!(!rec.attributes.contains_key("gpu_model"));
    assert_eq!(rec.attribute("gpu_model"), Some(Value::from("v100")));

    let rec = snap.get(&JobId::from("104.master.cluster")).expect("record");
    assert!(rec.unknown.is_empty());
}

#[test]
fn empty_dump_is_empty_snapshot() {
    let snap = QueueSnapshot::parse("").expect("empty");
    assert!(snap.is_empty());
    assert!(snap.count_by_state().values().all(|&n| n == 0));
}

#[test]
fn invalid_typed_value_names_line_and_key() {
    let err = QueueSnapshot::parse("Job Id: 1.m\n    Job_Name = a\n    Rerunable = maybe\n")
        .expect_err("not a boolean");
    assert!(matches!(err, QueueError::InvalidValue { line: 3, .. }));
    assert_snapshot!(err.to_string(), @r#"line 3: invalid boolean "maybe" for Rerunable"#);
}

// =============================================================================
// QUERIES
// =============================================================================

#[test]
fn count_by_state_matches_hand_tally() {
    let snap = snapshot();
    let counts = snap.count_by_state();

    assert_eq!(counts.len(), JobState::ALL.len());
    let mut expected: BTreeMap<JobState, usize> = JobState::ALL.iter().map(|s| (*s, 0)).collect();
    expected.insert(JobState::Running, 2);
    expected.insert(JobState::Queued, 1);
    expected.insert(JobState::Completed, 1);
    assert_eq!(counts, expected);
    assert_eq!(counts.values().sum::<usize>(), snap.len());
}

#[test]
fn lookup_by_name() {
    let snap = snapshot();
    let rec = snap.by_name("J2_L8.h5").expect("job exists");
    assert_eq!(rec.id.as_str(), "102.master.cluster");
    assert!(snap.by_name("J9_L8.h5").is_none());
}

#[test]
fn filter_by_owner_accepts_user_or_full_owner() {
    let snap = snapshot();
    assert_eq!(
        names(&snap.filter_by_owner("alice")),
        vec!["J1_L8.h5", "J2_L8.h5", "J3_L8.h5"]
    );
    assert_eq!(names(&snap.filter_by_owner("bob@login2.cluster")), vec!["relax.sh"]);
    assert!(snap.filter_by_owner("carol").is_empty());
}

#[test]
fn usage_tallies() {
    let snap = snapshot();

    let owners = snap.usage_by_owner();
    let alice = &owners["alice"];
    assert_eq!(alice.project, "LOGIN1");
    assert_eq!((alice.total, alice.running, alice.queued), (3, 2, 1));
    assert_eq!(alice.queues.iter().map(String::as_str).collect::<Vec<_>>(), vec!["batch", "long"]);
    assert_eq!(
        owners["bob"],
        OwnerUsage {
            project: "LOGIN2".into(),
            total: 1,
            running: 0,
            queued: 0,
            queues: ["short".to_string()].into(),
        }
    );

    let queues = snap.usage_by_queue();
    assert_eq!(queues.keys().map(String::as_str).collect::<Vec<_>>(), vec!["batch", "long", "short"]);
    assert_eq!(
        queues["batch"],
        QueueUsage {
            total: 2,
            running: 1,
            queued: 1,
            users: ["alice".to_string()].into(),
        }
    );
}

// =============================================================================
// RECONCILIATION WITH A PARAMETER SPACE
// =============================================================================

#[test]
fn jobs_match_parameter_set_keys() {
    let conf = parse(
        "DECLARE J L\n\
         DATAFILE J%d_L%d\n\
         DATAFILE_VALUES J L\n\
         CMD_EXEC run %s\n\
         CMD_FILE create %s\n\
         CMD_CHECKFILE check %s\n\
         CMD_ACC acc %s\n\
         PSPACE:\n  PARAM J 1 2 5\n  PARAM L 8\n  ACC 1e-6\n",
    );
    let psets = expand(&conf).expect("expands");
    let snap = snapshot();

    assert_eq!(snap.count_matching(&psets), 2);

    let ours = snap.restrict_to(&psets);
    assert_eq!(names(&ours), vec!["J1_L8.h5", "J2_L8.h5"]);

    let running = ours
        .iter()
        .filter(|r| r.state() == Some(JobState::Running))
        .count();
    assert_eq!(conf.submit_headroom(running), None);

    let unsubmitted: Vec<&str> = psets
        .keys()
        .map(String::as_str)
        .filter(|k| ours.by_name(k).is_none())
        .collect();
    assert_eq!(unsubmitted, vec!["J5_L8.h5"]);
}

#[test]
fn snapshot_serializes_records() {
    let snap = QueueSnapshot::parse("Job Id: 7.m\n  Job_Name = x\n  custom = 1\n").expect("valid");
    let rec = snap.iter().next().expect("record");
    let json = serde_json::to_value(rec).expect("serializes");
    assert_eq!(json["id"], "7.m");
    assert_eq!(json["attributes"]["Job_Name"], "x");
    assert_eq!(json["attributes"]["Priority"], 0);
    assert_eq!(json["unknown"]["custom"], "1");
}
