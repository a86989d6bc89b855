//! Server timestamps in either of the two wire encodings.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp as it appears on the wire.
///
/// Servers emit either RFC 3339 strings or epoch milliseconds. The value is
/// informational; the engine stamps its own receive time on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    /// Epoch milliseconds
    Millis(i64),
    /// Free-form text, usually RFC 3339
    Text(String),
}

impl WireTimestamp {
    /// Interpret the timestamp as UTC, if it is well formed.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_wire_forms() {
        let millis: WireTimestamp = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(millis, WireTimestamp::Millis(1_700_000_000_000));
        assert_eq!(millis.to_utc().unwrap().timestamp(), 1_700_000_000);

        let text: WireTimestamp = serde_json::from_str("\"2024-05-01T10:00:00Z\"").unwrap();
        assert_eq!(text.to_utc().unwrap().timestamp(), 1_714_557_600);
    }

    #[test]
    fn garbage_text_has_no_utc_value() {
        let ts = WireTimestamp::Text("yesterday".to_string());
        assert!(ts.to_utc().is_none());
    }
}
