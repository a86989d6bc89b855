//! HTTP streaming transport backed by `reqwest`.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Request, Url};
use tracing::debug;

use super::{ConnectionHandle, EventSink, EventTransport};
use crate::error::TransportError;
use crate::sse::SseParser;

/// Server-push transport speaking `text/event-stream` over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpEventTransport {
    client: Client,
}

impl HttpEventTransport {
    /// Build a transport with the given connect timeout.
    ///
    /// No overall request timeout is set; the stream is expected to stay open
    /// indefinitely.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build_request(&self, url: &str) -> Result<Request, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }
        self.client
            .get(parsed)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .build()
            .map_err(|e| TransportError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

impl EventTransport for HttpEventTransport {
    fn open(&self, url: &str, sink: EventSink) -> Result<ConnectionHandle, TransportError> {
        let request = self.build_request(url)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let session = sink.session();
        let task = runtime.spawn(drive_stream(self.client.clone(), request, sink));
        Ok(ConnectionHandle::from_task(session, task))
    }

    fn transport_type(&self) -> &'static str {
        "http-sse"
    }
}

/// Pump one response body through the SSE parser into the sink.
async fn drive_stream(client: Client, request: Request, sink: EventSink) {
    let response = match client.execute(request).await {
        Ok(response) => response,
        Err(e) => {
            sink.failed(format!("connect failed: {e}"));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        sink.failed(format!("unexpected status {status}"));
        return;
    }
    if !sink.opened() {
        return;
    }

    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for message in parser.feed(&bytes) {
                    if !sink.message(message) {
                        return;
                    }
                }
            }
            Err(e) => {
                sink.failed(format!("stream dropped: {e}"));
                return;
            }
        }
    }

    debug!(session = %sink.session(), retry_hint = ?parser.retry_hint(), "Event stream ended");
    sink.failed("stream closed by server");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SessionId;
    use tokio::sync::mpsc;

    fn transport() -> HttpEventTransport {
        HttpEventTransport::new(Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn malformed_url_fails_construction() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(SessionId::new(1), tx);
        let err = transport().open("not a url", sink).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn non_http_scheme_fails_construction() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(SessionId::new(1), tx);
        let err = transport().open("ws://127.0.0.1:1/stream", sink).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn opening_outside_a_runtime_fails_construction() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(SessionId::new(1), tx);
        let err = transport().open("http://127.0.0.1:1/stream", sink).unwrap_err();
        assert_eq!(err, TransportError::NoRuntime);
    }

    #[tokio::test]
    async fn refused_connection_reports_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(SessionId::new(9), tx);
        // Port 1 on loopback is not listening in test environments.
        let _handle = transport().open("http://127.0.0.1:1/stream", sink).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session, SessionId::new(9));
        assert!(matches!(event.kind, crate::transport::EventKind::Failed(_)));
    }
}
