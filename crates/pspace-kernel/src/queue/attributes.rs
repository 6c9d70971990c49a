//! Known `qstat -f1` attributes and their types.

use pspace_types::Value;

/// Type of a known job attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Str,
    Int,
    Bool,
}

impl AttributeType {
    /// Value a known attribute reads as when the record does not mention it.
    pub fn default_value(&self) -> Value {
        match self {
            AttributeType::Str => Value::String(String::new()),
            AttributeType::Int => Value::Int(0),
            AttributeType::Bool => Value::Bool(false),
        }
    }

    /// Parse raw attribute text; `None` if it does not fit the type.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            AttributeType::Str => Some(Value::String(raw.to_string())),
            AttributeType::Int => raw.trim().parse().ok().map(Value::Int),
            AttributeType::Bool => {
                let raw = raw.trim();
                if raw.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::Str => "string",
            AttributeType::Int => "integer",
            AttributeType::Bool => "boolean",
        }
    }
}

use AttributeType::{Bool, Int, Str};

/// Every attribute the snapshot types. Anything else is kept as raw text.
pub const KNOWN_ATTRIBUTES: &[(&str, AttributeType)] = &[
    ("Job_Name", Str),
    ("Job_Owner", Str),
    ("resources_used.cput", Str),
    ("resources_used.mem", Str),
    ("resources_used.vmem", Str),
    ("resources_used.walltime", Str),
    ("job_state", Str),
    ("queue", Str),
    ("server", Str),
    ("Checkpoint", Str),
    ("ctime", Str),
    ("mtime", Str),
    ("qtime", Str),
    ("etime", Str),
    ("Error_Path", Str),
    ("exec_host", Str),
    ("Hold_Types", Str),
    ("Join_Path", Str),
    ("Keep_Files", Str),
    ("Mail_Points", Str),
    ("Mail_Users", Str),
    ("Output_Path", Str),
    ("Priority", Int),
    ("Rerunable", Bool),
    ("Resource_List.cput", Str),
    ("Resource_List.nodect", Str),
    ("Resource_List.nodes", Str),
    ("Resource_List.host", Str),
    ("Resource_List.mem", Str),
    ("Resource_List.walltime", Str),
    ("Resource_List.ncpus", Int),
    ("session_id", Int),
    ("submit_args", Str),
    ("start_time", Str),
    ("start_count", Int),
    ("fault_tolerant", Bool),
    ("submit_host", Str),
    ("init_work_dir", Str),
    ("Walltime.Remaining", Int),
    ("x", Str),
    ("Shell_Path_List", Str),
    ("Variable_List", Str),
    ("interactive", Str),
    ("exit_status", Int),
];

/// Type of a known attribute.
pub fn attribute_type(key: &str) -> Option<AttributeType> {
    KNOWN_ATTRIBUTES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, ty)| *ty)
}
