//! Sessions as seen by extensions.
//!
//! The orchestrator owns sessions. Extensions only ever hold the uuid, plus
//! the read-only snapshot a batch reporter receives when the session ends.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub uuid: String,
    #[serde(default)]
    pub context: SessionContext,
}

/// Ordered, append-only session log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

/// One session log entry.
///
/// The orchestrator may omit `type` when it hands out session info, so the
/// lenient serde form defaults it. The end-of-session report is decoded with
/// [`Session::from_report_payload`], which requires every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "type", default)]
    pub category: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            category: category.into(),
            message: message.into(),
        }
    }
}

/// Reasons an end-of-session report cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("missing or invalid uuid")]
    MissingUuid,

    #[error("missing session context")]
    MissingContext,

    #[error("session log is not an array")]
    InvalidLog,

    #[error("invalid log entry format at index {0}")]
    InvalidEntry(usize),

    #[error("missing timestamp in log entry {0}")]
    MissingTimestamp(usize),

    #[error("invalid timestamp in log entry {index}: {value}")]
    InvalidTimestamp { index: usize, value: String },

    #[error("missing type in log entry {0}")]
    MissingEntryType(usize),

    #[error("missing message in log entry {0}")]
    MissingEntryMessage(usize),
}

impl Session {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            context: SessionContext::default(),
        }
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.context.log
    }

    /// Strictly decode the `{uuid, context: {log: [...]}}` report body.
    ///
    /// A missing `log` is an empty session. Every entry must carry an
    /// ISO-8601 timestamp with offset, a type and a message.
    pub fn from_report_payload(data: &Value) -> Result<Self, SessionError> {
        let uuid = data
            .get("uuid")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(SessionError::MissingUuid)?;

        let context = data
            .get("context")
            .filter(|c| c.is_object())
            .ok_or(SessionError::MissingContext)?;

        let log = match context.get("log") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .enumerate()
                .map(|(index, entry)| decode_entry(index, entry))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(SessionError::InvalidLog),
        };

        Ok(Self {
            uuid: uuid.to_string(),
            context: SessionContext { log },
        })
    }
}

fn decode_entry(index: usize, entry: &Value) -> Result<LogEntry, SessionError> {
    let entry = entry.as_object().ok_or(SessionError::InvalidEntry(index))?;

    let raw_timestamp = entry
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or(SessionError::MissingTimestamp(index))?;
    let timestamp = DateTime::parse_from_rfc3339(raw_timestamp).map_err(|_| {
        SessionError::InvalidTimestamp {
            index,
            value: raw_timestamp.to_string(),
        }
    })?;

    let category = entry
        .get("type")
        .and_then(Value::as_str)
        .ok_or(SessionError::MissingEntryType(index))?;
    let message = entry
        .get("message")
        .and_then(Value::as_str)
        .ok_or(SessionError::MissingEntryMessage(index))?;

    Ok(LogEntry::new(timestamp, category, message))
}
