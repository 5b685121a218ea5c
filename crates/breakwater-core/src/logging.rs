//! Structured logging for the connection driver.
//!
//! Log entries are structured records that render either as JSON (for
//! production ingestion) or as a compact console line. Sinks beyond stderr
//! are an external concern; the driver only builds entries and hands them to
//! a level-gated [`Logger`].

use std::fmt;

/// Log severity, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Verbose diagnostics, off in production.
    Debug = 0,
    /// Normal operation.
    Info = 1,
    /// Unexpected but recoverable.
    Warning = 2,
    /// A failure that affected a connection.
    Error = 3,
    /// A failure that affects the whole server.
    Critical = 4,
}

impl LogLevel {
    /// Returns the level as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Returns a single character tag for compact output.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warning => 'W',
            Self::Error => 'E',
            Self::Critical => 'C',
        }
    }

    /// Parse a level name as it appears in configuration.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured log record.
#[derive(Debug)]
pub struct LogEntry {
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Connection identifier, when the entry belongs to a connection.
    pub connection_id: Option<u64>,
    /// Structured key-value fields (at most 16 are kept).
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            connection_id: None,
            fields: Vec::new(),
        }
    }

    /// Attach the owning connection's id.
    #[must_use]
    pub fn connection(mut self, id: u64) -> Self {
        self.connection_id = Some(id);
        self
    }

    /// Add a structured field. Fields beyond the sixteenth are dropped.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        if self.fields.len() < 16 {
            self.fields.push((key.into(), value.to_string()));
        }
        self
    }

    /// Render the entry as a single-line JSON object.
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut json = format!(
            r#"{{"level":"{}","message":"{}""#,
            self.level,
            escape_json(&self.message)
        );
        if let Some(id) = self.connection_id {
            json.push_str(&format!(r#","connection_id":{id}"#));
        }
        if !self.fields.is_empty() {
            json.push_str(r#","fields":{"#);
            for (i, (k, v)) in self.fields.iter().enumerate() {
                if i > 0 {
                    json.push(',');
                }
                json.push_str(&format!(r#""{}":"{}""#, escape_json(k), escape_json(v)));
            }
            json.push('}');
        }
        json.push('}');
        json
    }

    /// Render the entry as a compact console line.
    #[must_use]
    pub fn to_compact(&self) -> String {
        let mut out = match self.connection_id {
            Some(id) => format!("[{}] conn={} {}", self.level.as_char(), id, self.message),
            None => format!("[{}] {}", self.level.as_char(), self.message),
        };
        if !self.fields.is_empty() {
            out.push_str(" {");
            for (i, (k, v)) in self.fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{k}={v}"));
            }
            out.push('}');
        }
        out
    }
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Level-gated logger handle.
///
/// Cloning is cheap; the server hands one to each connection.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    min_level: LogLevel,
}

impl Logger {
    /// Create a logger emitting entries at `min_level` and above.
    #[must_use]
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    /// Returns true if `level` would be emitted.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Emit an entry if its level passes the gate.
    pub fn emit(&self, entry: &LogEntry) {
        if self.enabled(entry.level) {
            eprintln!("{}", entry.to_compact());
        }
    }

    /// Convenience: emit a bare message at the given level.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(&LogEntry::new(level, message));
    }
}
