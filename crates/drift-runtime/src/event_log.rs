//! Per-node append-only event log
//!
//! One plain-text line per event, consumed by external analysis tooling:
//!
//! ```text
//! <EVENT> | System Time: <secs:.4f> | Logical Clock: <int> | <detail>
//! ```
//!
//! `EVENT` is `SEND to VM <id>`, `SEND to VMs <id, id, ...>`, `RECEIVE` or
//! `INTERNAL`. The detail field is free text.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use drift_core::{DriftError, DriftResult, NodeId, WallTime};

/// Event kind, with the recipient list for sends
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Send(Vec<NodeId>),
    Receive,
    Internal,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Send(to) if to.len() == 1 => write!(f, "SEND to VM {}", to[0]),
            EventKind::Send(to) => {
                write!(f, "SEND to VMs ")?;
                for (i, id) in to.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", id)?;
                }
                Ok(())
            }
            EventKind::Receive => write!(f, "RECEIVE"),
            EventKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// One log record
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    pub kind: EventKind,
    pub system_time: WallTime,
    pub logical_clock: u64,
    pub detail: String,
}

impl LogEvent {
    pub fn send(to: Vec<NodeId>, system_time: WallTime, logical_clock: u64) -> Self {
        LogEvent {
            kind: EventKind::Send(to),
            system_time,
            logical_clock,
            detail: format!("Message Clock Sent: {}", logical_clock),
        }
    }

    /// An unnamed sender is logged as `From VM None`
    pub fn receive(
        from: Option<NodeId>,
        queue_len: usize,
        system_time: WallTime,
        logical_clock: u64,
    ) -> Self {
        LogEvent {
            kind: EventKind::Receive,
            system_time,
            logical_clock,
            detail: match from {
                Some(from) => format!("From VM {}, Queue Length: {}", from, queue_len),
                None => format!("From VM None, Queue Length: {}", queue_len),
            },
        }
    }

    pub fn internal(system_time: WallTime, logical_clock: u64) -> Self {
        LogEvent {
            kind: EventKind::Internal,
            system_time,
            logical_clock,
            detail: String::new(),
        }
    }

    /// Render without the trailing newline
    pub fn to_line(&self) -> String {
        format!(
            "{} | System Time: {:.4} | Logical Clock: {} | {}",
            self.kind,
            self.system_time.as_secs_f64(),
            self.logical_clock,
            self.detail
        )
    }

    /// Parse a line produced by [`LogEvent::to_line`].
    /// System time comes back rounded to the logged precision.
    pub fn parse_line(line: &str) -> DriftResult<Self> {
        let malformed = || DriftError::MalformedLogLine(line.to_string());
        let line = line.trim_end_matches(['\r', '\n']);

        let mut fields = line.splitn(4, " | ");
        let event = fields.next().ok_or_else(malformed)?;
        let time = fields.next().ok_or_else(malformed)?;
        let clock = fields.next().ok_or_else(malformed)?;
        // Internal events end in "| " which may have been trimmed
        let detail = fields.next().unwrap_or("").to_string();
        let clock = clock.strip_suffix(" |").unwrap_or(clock);

        let kind = if event == "RECEIVE" {
            EventKind::Receive
        } else if event == "INTERNAL" {
            EventKind::Internal
        } else if let Some(ids) = event.strip_prefix("SEND to VMs ") {
            EventKind::Send(parse_ids(ids).ok_or_else(malformed)?)
        } else if let Some(id) = event.strip_prefix("SEND to VM ") {
            EventKind::Send(parse_ids(id).ok_or_else(malformed)?)
        } else {
            return Err(malformed());
        };

        let system_time = time
            .strip_prefix("System Time: ")
            .and_then(|t| t.parse::<f64>().ok())
            .map(WallTime::from_secs_f64)
            .ok_or_else(malformed)?;
        let logical_clock = clock
            .strip_prefix("Logical Clock: ")
            .and_then(|c| c.parse::<u64>().ok())
            .ok_or_else(malformed)?;

        Ok(LogEvent {
            kind,
            system_time,
            logical_clock,
            detail,
        })
    }
}

fn parse_ids(ids: &str) -> Option<Vec<NodeId>> {
    ids.split(", ")
        .map(|id| id.trim().parse::<u64>().ok().map(NodeId::new))
        .collect()
}

/// Append-only event log with a single writer
pub struct EventLog<W: Write = File> {
    writer: W,
    records: u64,
}

impl EventLog<File> {
    /// Open `path` for appending, creating it if missing
    pub fn open(path: impl AsRef<Path>) -> DriftResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DriftError::LogOpen {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(EventLog::from_writer(file))
    }
}

impl<W: Write> EventLog<W> {
    pub fn from_writer(writer: W) -> Self {
        EventLog { writer, records: 0 }
    }

    /// Write one line and flush it
    pub fn append(&mut self, event: &LogEvent) -> DriftResult<()> {
        writeln!(self.writer, "{}", event.to_line())
            .and_then(|_| self.writer.flush())
            .map_err(|e| DriftError::Log(e.to_string()))?;
        self.records += 1;
        Ok(())
    }

    /// Records written through this handle
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
