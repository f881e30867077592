//! Alert fan-out: one alert model, a registry of sinks, and the sinks the
//! monitor ships with (Splunk HEC and syslog) plus the heartbeat task.

mod heartbeat;
mod splunk;
mod syslog;

pub use heartbeat::heartbeat_loop;
pub use splunk::SplunkSink;
pub use syslog::{DEFAULT_PRIORITY, SyslogConfig, SyslogProto, SyslogSink};

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Stable reason strings; sinks use them to classify events.
pub const REASON_FILE_MISMATCH: &str = "file content mismatch";
pub const REASON_NEW_FILE: &str = "new file found";
pub const REASON_FILE_DELETED: &str = "file deleted";
pub const REASON_HEARTBEAT: &str = "heartbeat event";

/// Numeric event-type code for a reason, as carried in syslog records.
pub fn event_type_code(reason: &str) -> u16 {
    match reason {
        REASON_FILE_MISMATCH => 1,
        REASON_NEW_FILE => 2,
        REASON_FILE_DELETED => 3,
        REASON_HEARTBEAT => 4,
        _ => 0,
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub time: DateTime<Utc>,
    pub message: String,
    pub reason: String,
    pub path: String,
    pub process_name: String,
}

impl Alert {
    pub fn new(
        message: impl Into<String>,
        reason: impl Into<String>,
        path: impl Into<String>,
        process_name: impl Into<String>,
    ) -> Self {
        Self {
            time: Utc::now(),
            message: message.into(),
            reason: reason.into(),
            path: path.into(),
            process_name: process_name.into(),
        }
    }
}

/// One failed sink delivery.
#[derive(Debug, thiserror::Error)]
#[error("sink {sink}: {message}")]
pub struct SinkError {
    pub sink: String,
    pub message: String,
}

impl SinkError {
    pub fn new(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            message: message.into(),
        }
    }
}

/// Aggregated per-sink failures from one fan-out delivery.
#[derive(Debug)]
pub struct SendErrors(Vec<SinkError>);

impl SendErrors {
    pub fn errors(&self) -> &[SinkError] {
        &self.0
    }
}

impl std::error::Error for SendErrors {}

impl fmt::Display for SendErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert delivery failed: ")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// A registered alert destination.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, alert: &Alert) -> Result<(), SinkError>;
}

/// Registry of sinks, populated at startup and read-only afterwards.
///
/// Delivery is best-effort: every sink gets the alert even when earlier
/// ones fail, and partial success counts as delivered. The aggregated
/// error is for logging only and must never suppress the downstream
/// remediation.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Box<dyn Sink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub async fn send(&self, alert: &Alert) -> Result<(), SendErrors> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(err) = sink.send(alert).await {
                errors.push(err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SendErrors(errors))
        }
    }
}

impl fmt::Debug for Fanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("Fanout").field("sinks", &names).finish()
    }
}
