use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::SharedState;
use crate::analysis::analyze_risk;
use crate::error::{McpError, McpResult};
use crate::personas::Persona;
use crate::workflow::{FollowUpRequest, StressTestRequest};

/// Shortest idea accepted over MCP, in characters after trimming.
pub const MIN_IDEA_CHARS: usize = 10;
/// Shortest follow-up question accepted over MCP.
pub const MIN_QUESTION_CHARS: usize = 5;
/// Default and maximum page size for `stress_test_recent`.
pub const DEFAULT_RECENT_LIMIT: u32 = 10;
pub const MAX_RECENT_LIMIT: u32 = 100;

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
    cancel: &CancellationToken,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        "stress_test_run" => handle_run(state, arguments, cancel).await,
        "stress_test_follow_up" => handle_follow_up(state, arguments, cancel).await,
        "stress_test_history" => handle_history(state, arguments).await,
        "stress_test_recent" => handle_recent(state, arguments).await,
        "risk_signals_analyze" => handle_risk_signals(state, arguments),
        "stress_test_health" => handle_health(state),
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct RunParams {
    idea: String,
    #[serde(default)]
    selected_critics: Option<Vec<String>>,
    #[serde(default)]
    context_id: Option<String>,
}

/// Handle stress_test_run tool call
async fn handle_run(
    state: &SharedState,
    arguments: Option<Value>,
    cancel: &CancellationToken,
) -> McpResult<Value> {
    let tool = "stress_test_run";
    execute_handler(tool, arguments, |params: RunParams| async move {
        require_min_chars(tool, "idea", &params.idea, MIN_IDEA_CHARS)?;
        let request = StressTestRequest {
            idea: params.idea,
            selected_critics: params.selected_critics,
            context_id: params.context_id,
        };
        state
            .orchestrator
            .run(request, cancel)
            .await
            .map_err(|e| McpError::from_app(tool, e))
    })
    .await
}

#[derive(Debug, Deserialize)]
struct FollowUpParams {
    context_id: String,
    question: String,
}

/// Handle stress_test_follow_up tool call
async fn handle_follow_up(
    state: &SharedState,
    arguments: Option<Value>,
    cancel: &CancellationToken,
) -> McpResult<Value> {
    let tool = "stress_test_follow_up";
    execute_handler(tool, arguments, |params: FollowUpParams| async move {
        require_min_chars(tool, "context_id", &params.context_id, 1)?;
        require_min_chars(tool, "question", &params.question, MIN_QUESTION_CHARS)?;
        state
            .orchestrator
            .follow_up(&FollowUpRequest::new(params.context_id, params.question), cancel)
            .await
            .map_err(|e| McpError::from_app(tool, e))
    })
    .await
}

/// Handle stress_test_history - stored runs, follow-ups and ledger for a context
async fn handle_history(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct HistoryParams {
        context_id: String,
    }

    let tool = "stress_test_history";
    let params: HistoryParams = parse_arguments(tool, arguments)?;

    let result = state
        .orchestrator
        .history(&params.context_id)
        .await
        .map_err(|e| McpError::from_app(tool, e))?;

    serde_json::to_value(result).map_err(McpError::Json)
}

/// Handle stress_test_recent - most recent runs, newest first
async fn handle_recent(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct RecentParams {
        #[serde(default)]
        limit: Option<u32>,
    }

    let tool = "stress_test_recent";
    let params: RecentParams = match arguments {
        None | Some(Value::Null) => RecentParams { limit: None },
        args => parse_arguments(tool, args)?,
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);

    let runs = state
        .orchestrator
        .recent(limit)
        .await
        .map_err(|e| McpError::from_app(tool, e))?;

    Ok(serde_json::json!({
        "count": runs.len(),
        "runs": runs,
    }))
}

/// Handle risk_signals_analyze - local scoring of caller-supplied critiques
fn handle_risk_signals(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct RiskParams {
        critiques: BTreeMap<String, String>,
        #[serde(default)]
        threshold: Option<usize>,
    }

    let tool = "risk_signals_analyze";
    let params: RiskParams = parse_arguments(tool, arguments)?;

    let mut critiques = BTreeMap::new();
    for (name, text) in params.critiques {
        let persona: Persona = name.parse().map_err(|e: String| invalid(tool, e))?;
        critiques.insert(persona, text);
    }

    let analyzer = state.orchestrator.analyzer();
    let threshold = match params.threshold {
        Some(0) => return Err(invalid(tool, "threshold must be at least 1")),
        Some(t) => t,
        None => analyzer.threshold(),
    };

    let signals = analyze_risk(&critiques, threshold, analyzer.catalog());
    serde_json::to_value(signals).map_err(McpError::Json)
}

#[derive(Debug, Serialize)]
struct HealthPayload {
    status: String,
    gateway_configured: bool,
    version: &'static str,
}

/// Handle stress_test_health - configuration check, no network call
fn handle_health(state: &SharedState) -> McpResult<Value> {
    let report = state.orchestrator.health();
    serde_json::to_value(HealthPayload {
        status: report.status,
        gateway_configured: report.gateway_configured,
        version: env!("CARGO_PKG_VERSION"),
    })
    .map_err(McpError::Json)
}

// ============================================================================
// Helper functions
// ============================================================================

fn invalid(tool_name: &str, message: impl Into<String>) -> McpError {
    McpError::InvalidParameters {
        tool_name: tool_name.to_string(),
        message: message.into(),
    }
}

fn require_min_chars(tool_name: &str, field: &str, value: &str, min: usize) -> McpResult<()> {
    if value.trim().chars().count() < min {
        return Err(invalid(
            tool_name,
            format!("{} must be at least {} characters", field, min),
        ));
    }
    Ok(())
}

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| invalid(tool_name, e.to_string())),
        None => Err(invalid(tool_name, "Missing arguments")),
    }
}

/// Parse arguments, run an operation, serialize its result.
///
/// Errors the operation returns pass through unchanged, so validation inside
/// the operation can still surface as invalid parameters.
async fn execute_handler<P, R, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = McpResult<R>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;
    let result = operation(params).await?;
    serde_json::to_value(result).map_err(McpError::Json)
}
