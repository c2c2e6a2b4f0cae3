//! Storage layer for stress-test persistence.
//!
//! Completed runs, follow-up exchanges on a run's main-line context, and a
//! per-stage invocation ledger are kept in SQLite.

mod sqlite;


pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ModelBinding;
use crate::error::StorageResult;

/// A completed stress-test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier (same as the returned result's run id).
    pub id: String,
    /// Main-line conversation context the run used.
    pub context_id: String,
    /// Assistant identity the contexts were opened under.
    pub assistant_id: String,
    /// Idea as submitted.
    pub input_idea: String,
    /// Hype-free rewrite.
    pub neutral_idea: String,
    /// Extracted assumptions text.
    pub assumptions: String,
    /// Critiques keyed by persona name.
    pub critiques: serde_json::Value,
    /// Computed risk signals.
    pub risk_signals: serde_json::Value,
    /// Final verdict text.
    pub verdict: String,
    /// Persona names that ran, canonical order.
    pub personas: Vec<String>,
    /// Wall-clock duration of the run.
    pub latency_ms: i64,
    /// When the run completed.
    pub created_at: DateTime<Utc>,
}

/// A question asked in a run's main-line context after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpRecord {
    pub id: String,
    pub context_id: String,
    pub question: String,
    pub answer: String,
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry for one gateway exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Unique invocation identifier.
    pub id: String,
    /// Run the exchange belonged to, if any.
    pub run_id: Option<String>,
    /// Main-line context of the run or follow-up.
    pub context_id: Option<String>,
    /// Workflow stage ("bias_remover", "assumptions", "critic", ...).
    pub stage: String,
    /// Persona for critic stages.
    pub persona: Option<String>,
    pub llm_provider: String,
    pub model_name: String,
    pub latency_ms: Option<i64>,
    pub success: bool,
    /// Error message (if failed).
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FollowUpRecord {
    /// Create a new follow-up record
    pub fn new(
        context_id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        latency_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context_id: context_id.into(),
            question: question.into(),
            answer: answer.into(),
            latency_ms,
            created_at: Utc::now(),
        }
    }
}

impl Invocation {
    /// Create a new invocation entry for a stage routed to a model
    pub fn new(stage: impl Into<String>, model: &ModelBinding) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: None,
            context_id: None,
            stage: stage.into(),
            persona: None,
            llm_provider: model.llm_provider.clone(),
            model_name: model.model_name.clone(),
            latency_ms: None,
            success: true,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Set the run ID
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set the main-line context ID
    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Set the persona
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    /// Mark as successful
    pub fn success(mut self, latency_ms: i64) -> Self {
        self.success = true;
        self.error = None;
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Mark as failed with error
    pub fn failure(mut self, error: impl Into<String>, latency_ms: i64) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Storage trait for database operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    // Run operations

    /// Persist a completed run.
    async fn save_run(&self, run: &RunRecord) -> StorageResult<()>;
    /// Get a run by ID.
    async fn get_run(&self, id: &str) -> StorageResult<Option<RunRecord>>;
    /// Get every run on a main-line context, oldest first.
    async fn get_context_runs(&self, context_id: &str) -> StorageResult<Vec<RunRecord>>;
    /// Get the most recent runs, newest first.
    async fn list_recent_runs(&self, limit: u32) -> StorageResult<Vec<RunRecord>>;

    // Follow-up operations

    /// Persist a follow-up exchange.
    async fn save_follow_up(&self, follow_up: &FollowUpRecord) -> StorageResult<()>;
    /// Get follow-ups on a context, oldest first.
    async fn get_follow_ups(&self, context_id: &str) -> StorageResult<Vec<FollowUpRecord>>;

    // Invocation logging

    /// Log a gateway exchange.
    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()>;
    /// Get the invocation ledger for a context, oldest first.
    async fn get_context_invocations(&self, context_id: &str) -> StorageResult<Vec<Invocation>>;
}
