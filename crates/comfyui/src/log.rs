//! Structured job log.
//!
//! Every step of a job, and every HTTP exchange with the relay, produces a
//! [`LogEntry`]. Entries always go to `tracing`; when the caller supplies
//! a [`LogSink`] they are also handed to it so a front end can show the
//! full trail next to the last error.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// Maximum number of characters of a response body kept in a log entry.
pub const BODY_EXCERPT_LIMIT: usize = 500;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// One request/response pair with the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpExchange {
    pub method: &'static str,
    pub url: String,
    /// `None` when no response was received.
    pub status: Option<u16>,
    /// Response body, truncated to [`BODY_EXCERPT_LIMIT`] characters.
    pub body_excerpt: Option<String>,
}

/// A single structured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub http: Option<HttpExchange>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )?;
        if let Some(http) = &self.http {
            match http.status {
                Some(status) => write!(f, " ({} {} -> {status})", http.method, http.url)?,
                None => write!(f, " ({} {} -> no response)", http.method, http.url)?,
            }
            if let Some(body) = &http.body_excerpt {
                if !body.is_empty() {
                    write!(f, " body: {body}")?;
                }
            }
        }
        Ok(())
    }
}

/// Receiver of structured job log entries.
pub trait LogSink: Send + Sync {
    fn record(&self, entry: LogEntry);
}

/// Sink that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Entries rendered as display lines.
    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(ToString::to_string).collect()
    }

    /// Entries that describe an HTTP exchange.
    pub fn exchanges(&self) -> Vec<HttpExchange> {
        self.entries().into_iter().filter_map(|e| e.http).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn record(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Log front end used by the client: traces every entry and mirrors it
/// into the optional sink.
#[derive(Clone, Default)]
pub struct JobLog {
    sink: Option<Arc<dyn LogSink>>,
}

impl fmt::Debug for JobLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLog")
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl JobLog {
    pub fn new(sink: Option<Arc<dyn LogSink>>) -> Self {
        Self { sink }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, message.into(), None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message.into(), None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warn, message.into(), None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message.into(), None);
    }

    /// Record a request/response pair. Non-2xx and missing responses are
    /// logged at WARN.
    pub fn exchange(
        &self,
        method: &'static str,
        url: &str,
        status: Option<u16>,
        body: Option<&str>,
    ) {
        let level = match status {
            Some(s) if (200..300).contains(&s) => LogLevel::Debug,
            _ => LogLevel::Warn,
        };
        let message = match status {
            Some(s) => format!("{method} {url} returned HTTP {s}"),
            None => format!("{method} {url} failed without a response"),
        };
        let http = HttpExchange {
            method,
            url: url.to_string(),
            status,
            body_excerpt: body.map(truncate_body),
        };
        self.emit(level, message, Some(http));
    }

    fn emit(&self, level: LogLevel, message: String, http: Option<HttpExchange>) {
        let url = http.as_ref().map(|h| h.url.as_str()).unwrap_or_default();
        let status = http.as_ref().and_then(|h| h.status);
        let body = http
            .as_ref()
            .and_then(|h| h.body_excerpt.as_deref())
            .unwrap_or_default();

        match level {
            LogLevel::Debug => tracing::debug!(url, ?status, body, "{message}"),
            LogLevel::Info => tracing::info!(url, ?status, "{message}"),
            LogLevel::Warn => tracing::warn!(url, ?status, body, "{message}"),
            LogLevel::Error => tracing::error!(url, ?status, body, "{message}"),
        }

        if let Some(sink) = &self.sink {
            sink.record(LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                http,
            });
        }
    }
}

/// Truncate a response body for logging, marking the cut.
pub fn truncate_body(body: &str) -> String {
    let mut chars = body.char_indices();
    match chars.nth(BODY_EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}... ({} bytes total)", &body[..cut], body.len()),
        None => body.to_string(),
    }
}
