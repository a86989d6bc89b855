//! Engine errors
//!
//! None of these cross the engine boundary as raised errors. Transport and
//! construction failures are folded into [`ConnectionStatus`](crate::ConnectionStatus)
//! and malformed messages are dropped; the types exist so the boundary can
//! log precisely what happened.

use thiserror::Error;

/// Failure to construct or drive a stream connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The stream URL could not be used
    #[error("invalid stream url `{url}`: {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
    /// No async runtime is available to drive the connection
    #[error("no async runtime available to drive the connection")]
    NoRuntime,
    /// HTTP client could not be built
    #[error("failed to build stream client: {0}")]
    Client(String),
    /// The endpoint refused the connection outright
    #[error("connection refused: {0}")]
    Refused(String),
}

/// A stream message that cannot be reconciled.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Event category this stream does not understand
    #[error("unexpected `{event}` event on {stream} stream")]
    UnexpectedEvent {
        /// Stream instance name
        stream: &'static str,
        /// Event category received
        event: String,
    },
    /// Payload is not valid JSON, carries a wrong tag, or lacks a field
    #[error("malformed {stream} payload: {source}")]
    Malformed {
        /// Stream instance name
        stream: &'static str,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// File is not valid TOML for this config
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File that failed
        path: String,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
    /// A field holds an unusable value
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
