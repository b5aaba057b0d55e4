use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::watch;

use crate::config::ConfigError;
use crate::protocol::{
    InitializeParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, ToolCallParams,
};
use crate::registry::{RegistryError, ToolRegistry};
use crate::transport::{Inbound, Message, MessageSink, Transport, MAX_MESSAGE_BYTES};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Failures while starting the server. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("tool registration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("HTTP client could not be built: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Ready,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// MCP server that communicates over a line-framed transport using JSON-RPC 2.0.
pub struct McpServer {
    info: ServerInfo,
    registry: Arc<ToolRegistry>,
    state: Arc<watch::Sender<ServerState>>,
    in_flight: Arc<AtomicUsize>,
    initialized: bool,
}

impl McpServer {
    pub fn new(info: ServerInfo, registry: ToolRegistry) -> Self {
        let (state, _) = watch::channel(ServerState::Starting);
        Self {
            info,
            registry: Arc::new(registry),
            state: Arc::new(state),
            in_flight: Arc::new(AtomicUsize::new(0)),
            initialized: false,
        }
    }

    /// Watch the connection lifecycle.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serve until the peer disconnects.
    ///
    /// Returns once the inbound stream ends or a reply can no longer be
    /// written. Tool calls still in flight keep running on their own tasks;
    /// their replies are dropped if the peer is gone.
    pub async fn serve(mut self, transport: Transport) {
        let (sink, mut inbound) = transport.into_parts();
        let replier = Replier {
            sink,
            state: Arc::clone(&self.state),
        };

        self.state.send_replace(ServerState::Ready);
        tracing::info!(
            server = %self.info.name,
            version = %self.info.version,
            tools = self.registry.len(),
            "server ready"
        );

        self.run_loop(&mut inbound, &replier).await;

        self.state.send_replace(ServerState::Disconnected);
        tracing::info!(
            in_flight = self.in_flight.load(Ordering::SeqCst),
            "peer disconnected"
        );
    }

    async fn run_loop(&mut self, inbound: &mut Inbound, replier: &Replier) {
        let mut state = self.state.subscribe();
        loop {
            tokio::select! {
                biased;
                () = disconnected(&mut state) => {
                    tracing::warn!("outbound stream failed, stopping");
                    break;
                }
                next = inbound.next() => match next {
                    Some(message) => self.handle_message(message, replier).await,
                    None => break,
                },
            }
        }
    }

    async fn handle_message(&mut self, message: Message, replier: &Replier) {
        if message.len() > MAX_MESSAGE_BYTES {
            tracing::warn!(
                bytes = message.len(),
                limit = MAX_MESSAGE_BYTES,
                "message too large"
            );
            replier
                .send(&JsonRpcResponse::error(None, JsonRpcError::parse_error()))
                .await;
            return;
        }

        let value: Value = match serde_json::from_slice(message.as_bytes()) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "parse error");
                replier
                    .send(&JsonRpcResponse::error(None, JsonRpcError::parse_error()))
                    .await;
                return;
            }
        };

        let req: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "not a JSON-RPC request");
                let id = value
                    .get("id")
                    .and_then(|id| serde_json::from_value::<RpcId>(id.clone()).ok());
                replier
                    .send(&JsonRpcResponse::error(id, JsonRpcError::invalid_request()))
                    .await;
                return;
            }
        };

        // Validate jsonrpc version
        if req.jsonrpc != "2.0" {
            if !req.is_notification() {
                replier
                    .send(&JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_request(),
                    ))
                    .await;
            }
            return;
        }

        if req.is_notification() {
            self.handle_notification(&req);
            return;
        }

        // Initialization gate: only `initialize` and `ping` are allowed before handshake completes
        if !self.initialized && req.method != "initialize" && req.method != "ping" {
            replier
                .send(&JsonRpcResponse::error(
                    req.id.clone(),
                    JsonRpcError::invalid_request_with("Server not initialized"),
                ))
                .await;
            return;
        }

        if let Some(resp) = self.dispatch(req, replier) {
            replier.send(&resp).await;
        }
    }

    fn handle_notification(&self, req: &JsonRpcRequest) {
        match req.method.as_str() {
            "notifications/initialized" => tracing::debug!("client finished initialization"),
            "notifications/cancelled" => {
                tracing::debug!("cancellation requested; in-flight calls run to completion")
            }
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }

    /// Route a request. Returns the reply to send inline, or `None` when the
    /// reply will be written later by a spawned tool call.
    fn dispatch(&mut self, req: JsonRpcRequest, replier: &Replier) -> Option<JsonRpcResponse> {
        let id = req.id.clone();
        match req.method.as_str() {
            "initialize" => {
                if let Some(params) = req
                    .params
                    .as_ref()
                    .and_then(|p| serde_json::from_value::<InitializeParams>(p.clone()).ok())
                {
                    let client = params.client_info.as_ref();
                    tracing::info!(
                        client = client.and_then(|c| c.name.as_deref()).unwrap_or("unknown"),
                        client_version = client
                            .and_then(|c| c.version.as_deref())
                            .unwrap_or("unknown"),
                        protocol = params.protocol_version.as_deref().unwrap_or("unspecified"),
                        "initialize"
                    );
                }
                self.initialized = true;
                Some(JsonRpcResponse::success(id, self.initialize_result()))
            }

            "ping" => Some(JsonRpcResponse::success(id, json!({}))),

            "tools/list" => Some(JsonRpcResponse::success(
                id,
                json!({ "tools": self.registry.list_tools() }),
            )),

            "tools/call" => self.call_tool(id, req.params, replier),

            _ => Some(JsonRpcResponse::error(
                id,
                JsonRpcError::method_not_found(&req.method),
            )),
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version
            }
        })
    }

    /// Resolve and validate inline, in inbound order; run the handler on its
    /// own task so slow calls never hold up the loop.
    fn call_tool(
        &self,
        id: Option<RpcId>,
        params: Option<Value>,
        replier: &Replier,
    ) -> Option<JsonRpcResponse> {
        let params: ToolCallParams = match params {
            Some(v) => match serde_json::from_value(v) {
                Ok(p) => p,
                Err(e) => {
                    return Some(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid tools/call params: {e}")),
                    ));
                }
            },
            None => {
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing params for tools/call"),
                ));
            }
        };

        let call = match self.registry.prepare(&params) {
            Ok(call) => call,
            Err(err) => {
                tracing::info!(tool = %params.name, error = %err, "tool call rejected");
                return Some(JsonRpcResponse::error(id, err.into()));
            }
        };

        tracing::debug!(tool = call.tool_name(), id = ?id, "dispatching tool call");

        let replier = replier.clone();
        let guard = InFlight::enter(&self.in_flight);
        tokio::spawn(async move {
            let _guard = guard;
            let result = call.invoke().await;
            let resp = match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => {
                    tracing::error!(error = %e, "tool result serialization failed");
                    JsonRpcResponse::error(id, JsonRpcError::internal_error("Internal error"))
                }
            };
            replier.send(&resp).await;
        });

        None
    }
}

/// Counts a tool call as in flight until dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn disconnected(state: &mut watch::Receiver<ServerState>) {
    // An error means the sender is gone, which only happens once the server is dropped.
    let _ = state.wait_for(|s| *s == ServerState::Disconnected).await;
}

/// Write half shared by the inbound loop and the per-call tasks.
#[derive(Clone)]
struct Replier {
    sink: MessageSink,
    state: Arc<watch::Sender<ServerState>>,
}

impl Replier {
    /// Write a reply. Failures move the server to `Disconnected`; once there,
    /// they are expected and only logged at debug level.
    async fn send(&self, resp: &JsonRpcResponse) {
        let message = match Message::from_json(resp) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "response serialization failed");
                return;
            }
        };

        if let Err(e) = self.sink.write(&message).await {
            if *self.state.borrow() == ServerState::Disconnected {
                tracing::debug!(error = %e, "peer gone, reply dropped");
            } else {
                tracing::warn!(error = %e, "failed to write reply");
                self.state.send_replace(ServerState::Disconnected);
            }
        }
    }
}
