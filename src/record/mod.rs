//! Log record decoding for Enhanced Monitoring payloads.
//!
//! Each entry in the `RDSOSMetrics` log stream carries a JSON snapshot of
//! OS state: a `processList` array and a `cpuUtilization` object. Decoding
//! produces a fixed [`LogRecord`] shape; a payload that is not valid JSON
//! or lacks either top-level field is a per-record [`RecordError`] the
//! caller skips and counts, never a batch failure.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors that can occur while decoding one log payload.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("payload is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("payload missing required field {field:?}")]
    MissingField { field: &'static str },
}

/// One process entry from a record's `processList`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub name: String,
    pub cpu_used_pct: f64,
    pub memory_used_pct: f64,
}

/// One decoded log entry: a timestamped snapshot of per-process and
/// per-CPU state. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp_millis: i64,
    pub processes: Vec<ProcessSample>,
    pub cpu_utilization: HashMap<String, f64>,
}

/// Decode one raw log message into a [`LogRecord`].
///
/// `timestamp_millis` is the log event's own timestamp; the message body
/// is the JSON snapshot. Both `processList` and `cpuUtilization` must be
/// present, but either may be empty.
pub fn parse_record(timestamp_millis: i64, message: &str) -> Result<LogRecord, RecordError> {
    let raw: RawRecord = serde_json::from_str(message)?;

    let processes = raw
        .process_list
        .ok_or(RecordError::MissingField {
            field: "processList",
        })?
        .into_iter()
        .map(|p| ProcessSample {
            name: p.name.unwrap_or_default(),
            cpu_used_pct: p.cpu_used_pc.0,
            memory_used_pct: p.memory_used_pc.0,
        })
        .collect();

    let cpu_utilization = raw
        .cpu_utilization
        .ok_or(RecordError::MissingField {
            field: "cpuUtilization",
        })?
        .into_iter()
        .map(|(name, value)| (name, value.0))
        .collect();

    Ok(LogRecord {
        timestamp_millis,
        processes,
        cpu_utilization,
    })
}

// --- JSON wire structures ---

#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "processList")]
    process_list: Option<Vec<RawProcess>>,

    #[serde(rename = "cpuUtilization")]
    cpu_utilization: Option<HashMap<String, LenientFloat>>,
}

#[derive(Deserialize)]
struct RawProcess {
    name: Option<String>,

    #[serde(rename = "cpuUsedPc", default)]
    cpu_used_pc: LenientFloat,

    #[serde(rename = "memoryUsedPc", default)]
    memory_used_pc: LenientFloat,
}

/// Numeric field that accepts a JSON number or a numeric string.
/// Anything else (missing, null, non-numeric text) coerces to 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LenientFloat(f64);

impl<'de> Deserialize<'de> for LenientFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let parsed = match &value {
            serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        };

        Ok(Self(parsed))
    }
}
