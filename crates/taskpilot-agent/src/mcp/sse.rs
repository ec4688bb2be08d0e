//! Persistent-stream transport: server-sent events in, HTTP POST out.
//!
//! The provider's first `endpoint` event names the URL (relative to the
//! stream URL) that outbound frames are posted to. Every `message` event
//! carries one inbound JSON-RPC frame.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Url;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::McpError;
use super::transport::{Inbound, Transport, INBOUND_CAPACITY};

pub struct SseTransport {
    http: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    /// Open the event stream and wait for the provider's `endpoint` event.
    pub async fn connect(
        label: &str,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<(Self, Inbound), McpError> {
        let connect_err = |reason: String| McpError::Connect {
            url: url.to_string(),
            reason,
        };
        let base = Url::parse(url).map_err(|e| connect_err(e.to_string()))?;
        let headers = header_map(headers).map_err(connect_err)?;
        let http = reqwest::Client::new();

        let response = tokio::time::timeout(
            timeout,
            http.get(base.clone())
                .headers(headers.clone())
                .header(ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| McpError::Timeout(timeout.as_secs()))?
        .map_err(|e| connect_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(connect_err(format!("HTTP {}", response.status())));
        }

        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = tokio::spawn(read_events(response, tx, endpoint_tx, label.to_string()));

        let endpoint = match tokio::time::timeout(timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                return Err(connect_err("stream ended before the endpoint event".into()))
            }
            Err(_) => {
                reader.abort();
                return Err(McpError::Timeout(timeout.as_secs()));
            }
        };
        let endpoint = base
            .join(&endpoint)
            .map_err(|e| McpError::Protocol(format!("bad endpoint '{endpoint}': {e}")))?;

        info!(provider = label, endpoint = %endpoint, "stream provider connected");
        Ok((
            Self {
                http,
                endpoint,
                headers,
                reader: Mutex::new(Some(reader)),
            },
            rx,
        ))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for (k, v) in headers {
        let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| format!("header {k}: {e}"))?;
        let value = HeaderValue::from_str(v).map_err(|e| format!("header {k}: {e}"))?;
        map.insert(name, value);
    }
    Ok(map)
}

async fn read_events(
    mut response: reqwest::Response,
    tx: mpsc::Sender<Value>,
    endpoint_tx: oneshot::Sender<String>,
    label: String,
) {
    let mut parser = SseParser::default();
    let mut endpoint_tx = Some(endpoint_tx);

    loop {
        let bytes = match response.chunk().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(provider = %label, "event stream ended");
                break;
            }
            Err(e) => {
                warn!(provider = %label, error = %e, "event stream error");
                break;
            }
        };

        for event in parser.feed(&bytes) {
            match event.event.as_str() {
                "endpoint" => {
                    if let Some(sender) = endpoint_tx.take() {
                        let _ = sender.send(event.data);
                    }
                }
                "message" => match serde_json::from_str::<Value>(&event.data) {
                    Ok(frame) => {
                        if tx.send(frame).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(provider = %label, error = %e, "unparseable frame"),
                },
                other => debug!(provider = %label, event = other, "ignoring event"),
            }
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&self, frame: &Value) -> Result<(), McpError> {
        if self.reader.lock().await.is_none() {
            return Err(McpError::Closed);
        }
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(frame)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(McpError::Transport(format!(
                "POST {} returned {}",
                self.endpoint,
                response.status()
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// SSE framing
// ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental parser over raw bytes; chunks may split lines, and UTF-8
/// sequences, anywhere. Only complete lines are decoded.
#[derive(Default)]
pub(crate) struct SseParser {
    partial: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.partial.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..pos]);
            let line = text.trim_end_matches('\r');

            if line.is_empty() {
                if !self.data.is_empty() || self.event.is_some() {
                    out.push(SseEvent {
                        event: self.event.take().unwrap_or_else(|| "message".into()),
                        data: std::mem::take(&mut self.data).join("\n"),
                    });
                }
            } else if line.starts_with(':') {
                // comment / keep-alive
            } else if let Some(value) = line.strip_prefix("event:") {
                self.event = Some(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parser_handles_split_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.feed(b"event: endp").is_empty());
        assert!(parser.feed(b"oint\ndata: /messages?s=1\r\n").is_empty());
        let events = parser.feed(b"\n: keep-alive\n\ndata: {\"a\":1}\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent { event: "endpoint".into(), data: "/messages?s=1".into() },
                SseEvent { event: "message".into(), data: "{\"a\":1}".into() },
            ]
        );
    }

    #[test]
    fn test_parser_joins_multiline_data() {
        let mut parser = SseParser::default();
        let events = parser.feed(b"data: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_parser_keeps_multibyte_char_split_across_chunks() {
        let frame = "data: {\"text\":\"café\"}\n\n".as_bytes();
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut parser = SseParser::default();
        assert!(parser.feed(&frame[..split]).is_empty());
        let events = parser.feed(&frame[split..]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"text\":\"café\"}");
        assert!(!events[0].data.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_connect_resolves_endpoint_and_forwards_messages() {
        let server = MockServer::start().await;
        let body = "event: endpoint\ndata: /messages?sessionId=abc\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/sse", server.uri());
        let (transport, mut inbound) =
            SseTransport::connect("test", &url, &HashMap::new(), Duration::from_secs(5))
                .await
                .unwrap();
        assert_eq!(transport.endpoint().path(), "/messages");
        assert_eq!(transport.endpoint().query(), Some("sessionId=abc"));

        let frame = inbound.recv().await.unwrap();
        assert_eq!(frame["id"], 1);

        transport.send(&json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).await.unwrap();
        transport.close().await.unwrap();
        assert!(matches!(transport.send(&json!({})).await, Err(McpError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = SseTransport::connect(
            "test",
            &format!("{}/sse", server.uri()),
            &HashMap::new(),
            Duration::from_secs(5),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, McpError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_stream_without_endpoint_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("data: {}\n\n", "text/event-stream"))
            .mount(&server)
            .await;

        let result = SseTransport::connect(
            "test",
            &format!("{}/sse", server.uri()),
            &HashMap::new(),
            Duration::from_secs(5),
        )
        .await;
        assert!(result.is_err());
    }
}
