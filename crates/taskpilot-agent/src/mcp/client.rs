//! JSON-RPC client for one remote tool provider, independent of transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::McpError;
use super::protocol::{initialize_params, notification, JsonRpcRequest, JsonRpcResponse, RemoteToolSpec};
use super::transport::{Inbound, Transport};
use crate::tools::ToolResult;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, McpError>>>>>;

pub struct McpClient {
    label: String,
    transport: Box<dyn Transport>,
    next_id: AtomicU64,
    pending: PendingMap,
    router: JoinHandle<()>,
    timeout: Duration,
}

impl McpClient {
    /// Start routing inbound frames and perform the `initialize` handshake.
    pub async fn connect(
        label: &str,
        transport: Box<dyn Transport>,
        inbound: Inbound,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let router = tokio::spawn(route_responses(inbound, pending.clone(), label.to_string()));

        let client = Self {
            label: label.to_string(),
            transport,
            next_id: AtomicU64::new(1),
            pending,
            router,
            timeout,
        };

        let info = client.request("initialize", Some(initialize_params())).await?;
        let server = server_name(&info);
        debug!(provider = %client.label, server, "provider initialized");
        client
            .transport
            .send(&notification("notifications/initialized"))
            .await?;
        Ok(client)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = serde_json::to_value(JsonRpcRequest::new(id, method, params))
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        debug!(provider = %self.label, id, method, "request");
        if let Err(e) = self.transport.send(&frame).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(McpError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    /// The provider's advertised tool catalog.
    pub async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, McpError> {
        let result = self.request("tools/list", None).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(tools).map_err(|e| McpError::Protocol(format!("tools/list: {e}")))
    }

    /// Invoke `name` on the provider and map its content blocks to a [`ToolResult`].
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, McpError> {
        let result = self
            .request("tools/call", Some(json!({"name": name, "arguments": arguments})))
            .await?;
        Ok(content_to_result(&result))
    }

    pub async fn close(&self) -> Result<(), McpError> {
        let closed = self.transport.close().await;
        self.router.abort();
        for (_, tx) in self.pending.lock().await.drain() {
            let _ = tx.send(Err(McpError::Closed));
        }
        closed
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.router.abort();
    }
}

/// `serverInfo.name` from an `initialize` result.
fn server_name(info: &Value) -> &str {
    info.pointer("/serverInfo/name")
        .and_then(Value::as_str)
        .unwrap_or("?")
}

/// Text blocks joined by newlines; the first image becomes the inline image;
/// `isError` moves the text into the error field.
fn content_to_result(result: &Value) -> ToolResult {
    let blocks = result
        .get("content")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let text = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");
    let image = blocks
        .iter()
        .find(|b| b.get("type").and_then(Value::as_str) == Some("image"))
        .and_then(|b| b.get("data").and_then(Value::as_str));

    let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
    let mut out = if is_error {
        ToolResult::failure(if text.is_empty() {
            "remote tool reported an error".to_string()
        } else {
            text
        })
    } else {
        ToolResult::success(text)
    };
    if let Some(image) = image {
        out = out.with_image(image);
    }
    out
}

/// Deliver responses to waiting callers; fail everyone when the stream ends.
async fn route_responses(mut inbound: Inbound, pending: PendingMap, label: String) {
    while let Some(frame) = inbound.recv().await {
        let resp: JsonRpcResponse = match serde_json::from_value(frame) {
            Ok(resp) => resp,
            Err(e) => {
                warn!(provider = %label, error = %e, "malformed response frame");
                continue;
            }
        };
        // Notifications and server requests carry no id we are waiting on.
        let Some(id) = resp.id else { continue };
        let Some(tx) = pending.lock().await.remove(&id) else {
            continue;
        };
        let payload = match resp.error {
            Some(err) => Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(resp.result.unwrap_or(Value::Null)),
        };
        let _ = tx.send(payload);
    }

    debug!(provider = %label, "inbound stream closed");
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(McpError::Closed));
    }
}

// ─────────────────────────────────────────────
// In-process provider for tests
// ─────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::mpsc;

    type Handler = Box<dyn Fn(&str, &Value) -> Option<Result<Value, (i64, String)>> + Send + Sync>;

    /// Answers requests synchronously from `handler`; `None` means never reply.
    pub struct FakeProvider {
        tx: mpsc::Sender<Value>,
        handler: Handler,
        pub sent: Arc<std::sync::Mutex<Vec<Value>>>,
        pub closed: Arc<AtomicBool>,
        fail_close: bool,
    }

    impl FakeProvider {
        pub fn new<F>(handler: F) -> (Self, Inbound)
        where
            F: Fn(&str, &Value) -> Option<Result<Value, (i64, String)>> + Send + Sync + 'static,
        {
            let (tx, rx) = mpsc::channel(16);
            (
                Self {
                    tx,
                    handler: Box::new(handler),
                    sent: Arc::new(std::sync::Mutex::new(Vec::new())),
                    closed: Arc::new(AtomicBool::new(false)),
                    fail_close: false,
                },
                rx,
            )
        }

        /// A provider advertising `tools`, whose `tools/call` echoes the name.
        pub fn with_tools(tools: &[&str]) -> (Self, Inbound) {
            let catalog: Vec<Value> = tools
                .iter()
                .map(|n| json!({"name": n, "description": format!("remote {n}"), "inputSchema": {"type": "object"}}))
                .collect();
            Self::new(move |method, params| match method {
                "initialize" => Some(Ok(json!({"serverInfo": {"name": "fake"}}))),
                "tools/list" => Some(Ok(json!({"tools": catalog.clone()}))),
                "tools/call" => Some(Ok(json!({
                    "content": [{"type": "text", "text": format!("called {}", params["name"].as_str().unwrap_or(""))}]
                }))),
                _ => Some(Err((-32601, "Method not found".into()))),
            })
        }

        pub fn failing_close(mut self) -> Self {
            self.fail_close = true;
            self
        }
    }

    #[async_trait]
    impl Transport for FakeProvider {
        async fn send(&self, frame: &Value) -> Result<(), McpError> {
            self.sent.lock().unwrap().push(frame.clone());
            let (Some(id), Some(method)) = (frame.get("id").cloned(), frame["method"].as_str())
            else {
                return Ok(());
            };
            let params = frame.get("params").cloned().unwrap_or(Value::Null);
            let reply = match (self.handler)(method, &params) {
                Some(Ok(result)) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                Some(Err((code, message))) => {
                    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
                }
                None => return Ok(()),
            };
            self.tx.send(reply).await.map_err(|_| McpError::Closed)
        }

        async fn close(&self) -> Result<(), McpError> {
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                Err(McpError::Transport("close failed".into()))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeProvider;
    use super::*;

    async fn connect(provider: FakeProvider, inbound: Inbound) -> McpClient {
        McpClient::connect("fake", Box::new(provider), inbound, Duration::from_secs(2))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_handshake_then_list_and_call() {
        let (provider, inbound) = FakeProvider::with_tools(&["fetch", "search"]);
        let client = connect(provider, inbound).await;

        let tools = client.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["fetch", "search"]);

        let result = client.call_tool("fetch", json!({"url": "x"})).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("called fetch"));
    }

    #[tokio::test]
    async fn test_initialized_notification_follows_handshake() {
        let (provider, inbound) = FakeProvider::with_tools(&[]);
        let sent = provider.sent.clone();
        let _client = connect(provider, inbound).await;

        let methods: Vec<String> = sent
            .lock()
            .unwrap()
            .iter()
            .map(|f| f["method"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(methods, vec!["initialize", "notifications/initialized"]);
        assert!(sent.lock().unwrap()[1].get("id").is_none());
    }

    #[tokio::test]
    async fn test_rpc_error_surfaces() {
        let (provider, inbound) = FakeProvider::new(|method, _| match method {
            "initialize" => Some(Ok(json!({}))),
            _ => Some(Err((-32602, "bad params".into()))),
        });
        let client = connect(provider, inbound).await;
        let err = client.call_tool("x", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::Rpc { code: -32602, .. }));
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (provider, inbound) = FakeProvider::new(|method, _| match method {
            "initialize" => Some(Ok(json!({}))),
            _ => None,
        });
        let client = McpClient::connect("fake", Box::new(provider), inbound, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(matches!(
            client.list_tools().await,
            Err(McpError::Timeout(_))
        ));
    }

    #[test]
    fn test_server_name_from_initialize_result() {
        assert_eq!(server_name(&json!({"serverInfo": {"name": "files"}})), "files");
        assert_eq!(server_name(&json!({"serverInfo": {}})), "?");
        assert_eq!(server_name(&json!({})), "?");
    }

    #[test]
    fn test_content_mapping() {
        let result = content_to_result(&json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "aW1n", "mimeType": "image/png"},
                {"type": "text", "text": "line two"},
                {"type": "image", "data": "second"}
            ]
        }));
        assert_eq!(result.output.as_deref(), Some("line one\nline two"));
        assert_eq!(result.base64_image.as_deref(), Some("aW1n"));

        let failed = content_to_result(&json!({
            "isError": true,
            "content": [{"type": "text", "text": "rate limited"}]
        }));
        assert_eq!(failed.error.as_deref(), Some("rate limited"));
        assert!(failed.output.is_none());
    }
}
