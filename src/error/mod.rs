use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("Critique failed for {}", format_critic_failures(.failures))]
    CriticsFailed { failures: Vec<(String, String)> },

    #[error("Stress test cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_critic_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(persona, message)| format!("{}: {}", persona, message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// Build an invalid-input error for a named field.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller, not the system, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::InvalidInput { .. })
    }
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Run not found for context: {context_id}")]
    RunNotFound { context_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Conversation gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Could not read {field} from gateway response")]
    MissingIdentity { field: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Map a workflow error raised while running `tool_name`.
    ///
    /// Client errors become invalid parameters, everything else is an
    /// execution failure.
    pub fn from_app(tool_name: &str, err: AppError) -> Self {
        if err.is_client_error() {
            let message = match err {
                AppError::InvalidInput { field, reason } => format!("{}: {}", field, reason),
                other => other.to_string(),
            };
            return McpError::InvalidParameters {
                tool_name: tool_name.to_string(),
                message,
            };
        }
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
