//! Structured JSONL operation logs.
//!
//! Core lifecycle events are mirrored into a line-oriented JSON stream so
//! trace runs can be audited offline. Every line is one [`LogEntry`];
//! required fields are `timestamp_ms`, `trace_id`, `level`, and `event`,
//! everything else is omitted when absent.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use fitheap_core::{EventLevel, HeapEvent};

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<EventLevel> for LogLevel {
    fn from(level: EventLevel) -> Self {
        match level {
            EventLevel::Trace => Self::Trace,
            EventLevel::Debug => Self::Debug,
            EventLevel::Info => Self::Info,
            EventLevel::Warn => Self::Warn,
            EventLevel::Error => Self::Error,
        }
    }
}

/// Canonical structured log entry, one JSONL line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_count: Option<usize>,
}

impl LogEntry {
    /// A new entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp_ms: now_epoch_ms(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            op: None,
            offset: None,
            size: None,
            outcome: None,
            details: None,
            free_bytes: None,
            block_count: None,
        }
    }

    /// Builds an entry from a core lifecycle event, keeping its trace id.
    #[must_use]
    pub fn from_heap_event(event: &HeapEvent) -> Self {
        Self {
            timestamp_ms: now_epoch_ms(),
            trace_id: event.trace_id.clone(),
            level: event.level.into(),
            event: String::from(event.event),
            op: Some(String::from(event.op)),
            offset: event.offset,
            size: event.size,
            outcome: Some(String::from(event.outcome)),
            details: (!event.details.is_empty()).then(|| event.details.clone()),
            free_bytes: Some(event.free_bytes),
            block_count: Some(event.block_count),
        }
    }

    /// Serializes to a single JSONL line without a trailing newline.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Writes structured JSONL log entries to a file or buffer.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    run_id: String,
}

impl LogEmitter {
    /// Creates an emitter writing to the given file path.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
            seq: 0,
            run_id: String::from(run_id),
        })
    }

    /// Creates an emitter writing to an in-memory buffer.
    #[must_use]
    pub fn to_buffer(run_id: &str) -> Self {
        Self {
            writer: Box::new(Vec::new()),
            seq: 0,
            run_id: String::from(run_id),
        }
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{:03}", self.run_id, self.seq)
    }

    /// Emits one entry with a generated trace id and returns it.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let entry = LogEntry::new(self.next_trace_id(), level, event);
        self.write_entry(&entry)?;
        Ok(entry)
    }

    /// Emits a core lifecycle event as one JSONL line and returns the
    /// entry that was written.
    pub fn emit_heap_event(&mut self, event: &HeapEvent) -> std::io::Result<LogEntry> {
        let entry = LogEntry::from_heap_event(event);
        self.write_entry(&entry)?;
        Ok(entry)
    }

    fn write_entry(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = entry.to_jsonl().map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Validates one JSONL line against the log schema.
///
/// Returns the parsed entry, or the list of problems found.
pub fn validate_log_line(line: &str, line_number: usize) -> Result<LogEntry, Vec<String>> {
    let entry: LogEntry = serde_json::from_str(line)
        .map_err(|err| vec![format!("line {line_number}: {err}")])?;
    let mut issues = Vec::new();
    if !entry.trace_id.contains("::") {
        issues.push(format!(
            "line {line_number}: trace_id '{}' has no scope separator",
            entry.trace_id
        ));
    }
    if entry.event.is_empty() {
        issues.push(format!("line {line_number}: event is empty"));
    }
    if entry.timestamp_ms == 0 {
        issues.push(format!("line {line_number}: timestamp_ms is zero"));
    }
    if issues.is_empty() {
        Ok(entry)
    } else {
        Err(issues)
    }
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
