//! MCP protocol implementation for JSON-RPC 2.0 communication.
//!
//! Requests are read line by line. Tool calls run as their own tasks so a
//! `notifications/cancelled` for a long stress test can be read and acted on
//! while the test is still running; everything else is answered inline.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "idea-stress-tester";

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Request identifier; null when the request could not be parsed.
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// MCP tool definition with JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Result of a tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

impl ToolCallResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error: is_error.then_some(true),
        }
    }
}

/// Key for the in-flight table; ids may be numbers or strings.
fn request_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// MCP Server running over stdio.
#[derive(Clone)]
pub struct McpServer {
    state: SharedState,
    /// Cancellation handles for tool calls still running, by request id.
    in_flight: Arc<Mutex<HashMap<String, CancellationToken>>>,
    /// Parent of every tool call's token; fired when input closes.
    shutdown: CancellationToken,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Run the server using async stdio
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Idea Stress Tester MCP server starting...");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC until the reader closes.
    ///
    /// On EOF, running tool calls are cancelled and awaited so their critic
    /// contexts are cleaned up before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer = Arc::new(tokio::sync::Mutex::new(writer));
        let mut reader = BufReader::new(reader);
        let mut tasks = JoinSet::new();
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            // EOF reached
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let request = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    let response =
                        JsonRpcResponse::error(None, -32700, format!("Parse error: {}", e));
                    write_response(&writer, &response).await?;
                    continue;
                }
            };

            if request.method == "tools/call" && request.id.is_some() {
                let server = self.clone();
                let writer = Arc::clone(&writer);
                tasks.spawn(async move {
                    if let Some(response) = server.dispatch_tool_call(request).await {
                        if let Err(e) = write_response(&writer, &response).await {
                            error!(error = %e, "Failed to write tool call response");
                        }
                    }
                });
            } else if let Some(response) = self.handle_request(request).await {
                write_response(&writer, &response).await?;
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Tool call task failed");
                }
            }
        }

        self.shutdown.cancel();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Tool call task failed");
            }
        }

        Ok(())
    }

    /// Run a tool call under its own cancellation token.
    ///
    /// Returns None when the client cancelled the request. A call reusing the
    /// id of one still running is rejected without being run.
    async fn dispatch_tool_call(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let key = request.id.as_ref().map(request_key);
        let cancel = self.shutdown.child_token();

        if let Some(key) = &key {
            let duplicate = {
                let mut in_flight = self.lock_in_flight();
                if in_flight.contains_key(key) {
                    true
                } else {
                    in_flight.insert(key.clone(), cancel.clone());
                    false
                }
            };
            if duplicate {
                warn!(request_id = %key, "Rejecting tool call with in-flight request id");
                return Some(JsonRpcResponse::error(
                    request.id,
                    -32600,
                    format!("Duplicate request id: {}", key),
                ));
            }
        }

        let response = self
            .handle_tool_call(request.id, request.params, &cancel)
            .await;

        // A cancelled request has already been taken out of the table
        let cancelled_by_client = match &key {
            Some(key) => self.lock_in_flight().remove(key).is_none(),
            None => false,
        };
        if cancelled_by_client {
            debug!(request_id = ?key, "Dropping response for cancelled request");
            return None;
        }
        Some(response)
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Handle a single JSON-RPC request.
    ///
    /// Returns None for notifications (requests without id).
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" | "notifications/initialized" => {
                debug!("Received initialized notification");
                None
            }
            "notifications/cancelled" => {
                self.handle_cancelled(request.params.as_ref());
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => {
                let cancel = self.shutdown.child_token();
                Some(
                    self.handle_tool_call(request.id, request.params, &cancel)
                        .await,
                )
            }
            "ping" => Some(JsonRpcResponse::success(request.id, json!({}))),
            method => {
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    fn handle_cancelled(&self, params: Option<&Value>) {
        let Some(request_id) = params.and_then(|p| p.get("requestId")) else {
            debug!("Cancellation without requestId, ignoring");
            return;
        };
        let key = request_key(request_id);

        match self.lock_in_flight().remove(&key) {
            Some(token) => {
                info!(request_id = %key, "Cancelling tool call");
                token.cancel();
            }
            None => debug!(request_id = %key, "Cancellation for unknown or finished request"),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        debug!("Handling tools/list request");
        JsonRpcResponse::success(id, json!({ "tools": tool_definitions() }))
    }

    async fn handle_tool_call(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params");
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let result = match handle_tool_call(&self.state, &params.name, params.arguments, cancel)
            .await
        {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => ToolCallResult::text(text, false),
                Err(e) => {
                    error!(error = %e, "Failed to serialize tool result");
                    ToolCallResult::text(format!("Error: Serialization failed: {}", e), true)
                }
            },
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                ToolCallResult::text(format!("Error: {}", e), true)
            }
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }
}

async fn write_response<W>(
    writer: &tokio::sync::Mutex<W>,
    response: &JsonRpcResponse,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response_json = serde_json::to_string(response)?;
    debug!(response = %response_json, "Sending response");

    let mut writer = writer.lock().await;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Every tool this server exposes.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        get_run_tool(),
        get_follow_up_tool(),
        get_history_tool(),
        get_recent_tool(),
        get_risk_signals_tool(),
        get_health_tool(),
    ]
}

fn get_run_tool() -> Tool {
    Tool {
        name: "stress_test_run".to_string(),
        description: "Stress-test a startup idea: rewrite it without hype, extract its assumptions, run persona critics (vc, engineer, ethicist, user, competitor) in parallel, score where their risks converge, and return a decisive verdict.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "idea": {
                    "type": "string",
                    "minLength": 10,
                    "description": "The idea to stress-test"
                },
                "selected_critics": {
                    "type": "array",
                    "items": {
                        "type": "string",
                        "enum": ["vc", "engineer", "ethicist", "user", "competitor"]
                    },
                    "description": "Critics to run (default: all five)"
                },
                "context_id": {
                    "type": "string",
                    "description": "Continue an existing conversation context"
                }
            },
            "required": ["idea"],
            "additionalProperties": false
        }),
    }
}

fn get_follow_up_tool() -> Tool {
    Tool {
        name: "stress_test_follow_up".to_string(),
        description: "Ask a follow-up question in the conversation context of an earlier stress test.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "context_id": {
                    "type": "string",
                    "description": "Context id from the run's meta.context_id"
                },
                "question": {
                    "type": "string",
                    "minLength": 5,
                    "description": "The question to ask"
                }
            },
            "required": ["context_id", "question"],
            "additionalProperties": false
        }),
    }
}

fn get_history_tool() -> Tool {
    Tool {
        name: "stress_test_history".to_string(),
        description: "Stored runs, follow-up answers and per-stage invocation log for a conversation context.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "context_id": {
                    "type": "string",
                    "description": "Context id from the run's meta.context_id"
                }
            },
            "required": ["context_id"],
            "additionalProperties": false
        }),
    }
}

fn get_recent_tool() -> Tool {
    Tool {
        name: "stress_test_recent".to_string(),
        description: "Most recent stored stress-test runs, newest first.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 100,
                    "description": "Number of runs to return (default: 10)"
                }
            },
            "additionalProperties": false
        }),
    }
}

fn get_risk_signals_tool() -> Tool {
    Tool {
        name: "risk_signals_analyze".to_string(),
        description: "Score critiques for risk themes raised by several personas. Local keyword analysis; no model calls.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "critiques": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Critique text keyed by persona name"
                },
                "threshold": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Personas needed for a high-confidence risk (default: configured threshold)"
                }
            },
            "required": ["critiques"],
            "additionalProperties": false
        }),
    }
}

fn get_health_tool() -> Tool {
    Tool {
        name: "stress_test_health".to_string(),
        description: "Report whether the conversation gateway credential is configured.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}
