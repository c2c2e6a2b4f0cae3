//! # Idea Stress Tester
//!
//! An MCP server that stress-tests startup ideas by delegating to a hosted
//! conversation service (Backboard) for every model call.
//!
//! ## Pipeline
//!
//! 1. **Bias removal**: the idea is rewritten without marketing language
//! 2. **Assumptions**: hidden assumptions are listed in the same context
//! 3. **Critics**: up to five personas critique the neutral idea concurrently,
//!    each in a throwaway context that is always deleted afterwards
//! 4. **Risk signals**: local keyword scoring of where the critics agree
//! 5. **Verdict**: a final judgment in the main-line context
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → Backboard API (HTTP)
//!                    ↓
//!              SQLite (runs, follow-ups, invocation log)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use idea_stress_tester::{AppState, Config, McpServer};
//! use idea_stress_tester::gateway::BackboardClient;
//! use idea_stress_tester::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = Arc::new(SqliteStorage::new(&config.database).await?);
//!     let gateway = Arc::new(BackboardClient::new(&config.gateway, config.request.clone())?);
//!     let state = Arc::new(AppState::new(config, storage, gateway)?);
//!     McpServer::new(state).run().await?;
//!     Ok(())
//! }
//! ```

/// Local risk-convergence scoring over persona critiques.
pub mod analysis;
/// Command-line interface.
pub mod cli;
/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Conversation gateway contract and the Backboard HTTP adapter.
pub mod gateway;
/// The five critic personas.
pub mod personas;
/// Prompt texts for each pipeline stage.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;
/// Stress-test orchestration.
pub mod workflow;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
pub use workflow::{StressTestOrchestrator, StressTestRequest, StressTestResult};
