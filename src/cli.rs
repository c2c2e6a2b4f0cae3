//! Command-line interface.
//!
//! `serve` (the default) speaks MCP over stdio; the remaining commands run a
//! single operation against the same state and print JSON to stdout.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::server::SharedState;
use crate::workflow::{FollowUpRequest, StressTestRequest};

/// Idea Stress Tester.
#[derive(Parser, Debug)]
#[command(name = "idea-stress-tester", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Serve MCP over stdio
    Serve,

    /// Stress-test one idea and print the result
    Run {
        /// The idea to stress-test
        #[arg(long)]
        idea: String,

        /// Critic to run; repeat for several (default: all five)
        #[arg(long = "critic")]
        critics: Vec<String>,

        /// Continue an existing conversation context
        #[arg(long)]
        context_id: Option<String>,
    },

    /// Ask a follow-up question in an earlier run's context
    FollowUp {
        #[arg(long)]
        context_id: String,

        #[arg(long)]
        question: String,
    },

    /// Show whether the gateway credential is configured
    Health,
}

impl Cli {
    /// The command to run, defaulting to `serve`.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    pub message: String,
}

impl CliResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::success(text),
            Err(e) => Self::error(format!("Error: failed to encode result: {}", e)),
        }
    }
}

/// Execute a one-shot command. `serve` is handled by the binary.
pub async fn execute_command(
    command: Commands,
    state: &SharedState,
    cancel: &CancellationToken,
) -> CliResult {
    match command {
        Commands::Serve => CliResult::error("serve is not a one-shot command"),
        Commands::Run {
            idea,
            critics,
            context_id,
        } => {
            let mut request = StressTestRequest::new(idea);
            if !critics.is_empty() {
                request = request.with_critics(critics);
            }
            if let Some(context_id) = context_id {
                request = request.with_context(context_id);
            }
            match state.orchestrator.run(request, cancel).await {
                Ok(result) => CliResult::json(&result),
                Err(e) => CliResult::error(format!("Error: {}", e)),
            }
        }
        Commands::FollowUp {
            context_id,
            question,
        } => {
            let request = FollowUpRequest::new(context_id, question);
            match state.orchestrator.follow_up(&request, cancel).await {
                Ok(result) => CliResult::json(&result),
                Err(e) => CliResult::error(format!("Error: {}", e)),
            }
        }
        Commands::Health => {
            let report = state.orchestrator.health();
            let mut result = CliResult::json(&report);
            if !report.gateway_configured {
                result.exit_code = 1;
            }
            result
        }
    }
}
