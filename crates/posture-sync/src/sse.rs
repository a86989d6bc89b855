//! # Server-Sent Events framing
//!
//! Incremental parser for the `text/event-stream` format. Bytes arrive in
//! arbitrary chunks; complete events are yielded as soon as their blank-line
//! terminator has been seen.
//!
//! ```text
//! event: fleet_event      <- optional category, defaults to "message"
//! id: 42                  <- optional event id
//! data: {"type":          <- data lines are joined with '\n'
//! data:  "node_joined"}
//! : keep-alive            <- comment, ignored
//!                         <- blank line dispatches
//! ```

use std::time::Duration;

use tracing::debug;

/// Event category used when the server names none.
pub const DEFAULT_EVENT: &str = "message";

/// One dispatched event, payload still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Category from the `event:` field
    pub event: Option<String>,
    /// Joined `data:` lines
    pub data: String,
    /// Value of the `id:` field
    pub id: Option<String>,
}

impl RawMessage {
    /// Unnamed event carrying `data`.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }

    /// Named event carrying `data`.
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
            id: None,
        }
    }

    /// Event category, falling back to [`DEFAULT_EVENT`].
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or(DEFAULT_EVENT)
    }
}

/// Longest line kept; longer lines are discarded whole.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Largest `data` payload kept for one event; larger events are discarded.
pub const MAX_EVENT_BYTES: usize = 4 << 20;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Incremental `text/event-stream` parser.
///
/// Lines may end in `\r\n`, `\n` or a lone `\r`. A leading byte order mark
/// is skipped.
#[derive(Debug, Default)]
pub struct SseParser {
    line: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_bytes: usize,
    last_id: Option<String>,
    retry: Option<Duration>,
    after_cr: bool,
    started: bool,
    line_overflow: bool,
    event_overflow: bool,
}

impl SseParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reconnection hint from a `retry:` field.
    ///
    /// Recorded for diagnostics only; the supervisor keeps its fixed delay.
    pub fn retry_hint(&self) -> Option<Duration> {
        self.retry
    }

    /// Feed a chunk and collect every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawMessage> {
        let mut out = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut out);
                }
                b'\n' => self.end_line(&mut out),
                _ if self.line_overflow => {}
                _ if self.line.len() >= MAX_LINE_BYTES => {
                    self.line_overflow = true;
                    self.line = Vec::new();
                }
                _ => self.line.push(byte),
            }
        }
        out
    }

    fn end_line(&mut self, out: &mut Vec<RawMessage>) {
        let mut line = std::mem::take(&mut self.line);
        if std::mem::take(&mut self.line_overflow) {
            debug!(limit = MAX_LINE_BYTES, "Discarding oversized event-stream line");
            return;
        }
        if !self.started {
            self.started = true;
            if line.starts_with(BOM) {
                line.drain(..BOM.len());
            }
        }
        let line = String::from_utf8_lossy(&line);
        if let Some(message) = self.process_line(&line) {
            out.push(message);
        }
    }

    fn process_line(&mut self, line: &str) -> Option<RawMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.push_data(value),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    fn push_data(&mut self, value: &str) {
        if self.event_overflow {
            return;
        }
        self.data_bytes += value.len() + 1;
        if self.data_bytes > MAX_EVENT_BYTES {
            self.event_overflow = true;
            self.data = Vec::new();
            return;
        }
        self.data.push(value.to_string());
    }

    fn dispatch(&mut self) -> Option<RawMessage> {
        let event = self.event.take();
        self.data_bytes = 0;
        if std::mem::take(&mut self.event_overflow) {
            debug!(limit = MAX_EVENT_BYTES, "Discarding oversized event");
            return None;
        }
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(RawMessage {
            event: event.filter(|name| !name.is_empty()),
            data,
            id: self.last_id.clone(),
        })
    }
}
