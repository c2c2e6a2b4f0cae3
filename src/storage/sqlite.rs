use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{FollowUpRecord, Invocation, RunRecord, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        Self::connect(options, config.max_connections).await
    }

    /// Create a storage instance backed by a private in-memory database.
    ///
    /// The pool holds a single connection; every connection to `:memory:` is a
    /// separate database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_json_text<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Query {
        message: format!("Failed to encode column: {}", e),
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const RUN_COLUMNS: &str = "id, context_id, assistant_id, input_idea, neutral_idea, assumptions, \
     critiques, risk_signals, verdict, personas, latency_ms, created_at";

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_run(&self, run: &RunRecord) -> StorageResult<()> {
        let critiques = to_json_text(&run.critiques)?;
        let risk_signals = to_json_text(&run.risk_signals)?;
        let personas = to_json_text(&run.personas)?;

        sqlx::query(
            r#"
            INSERT INTO runs (id, context_id, assistant_id, input_idea, neutral_idea, assumptions,
                              critiques, risk_signals, verdict, personas, latency_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.context_id)
        .bind(&run.assistant_id)
        .bind(&run.input_idea)
        .bind(&run.neutral_idea)
        .bind(&run.assumptions)
        .bind(&critiques)
        .bind(&risk_signals)
        .bind(&run.verdict)
        .bind(&personas)
        .bind(run.latency_ms)
        .bind(run.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_run(&self, id: &str) -> StorageResult<Option<RunRecord>> {
        let row: Option<RunRow> =
            sqlx::query_as(&format!("SELECT {} FROM runs WHERE id = ?", RUN_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_context_runs(&self, context_id: &str) -> StorageResult<Vec<RunRecord>> {
        let rows: Vec<RunRow> = sqlx::query_as(&format!(
            "SELECT {} FROM runs WHERE context_id = ? ORDER BY created_at ASC, rowid ASC",
            RUN_COLUMNS
        ))
        .bind(context_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_recent_runs(&self, limit: u32) -> StorageResult<Vec<RunRecord>> {
        let rows: Vec<RunRow> = sqlx::query_as(&format!(
            "SELECT {} FROM runs ORDER BY created_at DESC, rowid DESC LIMIT ?",
            RUN_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn save_follow_up(&self, follow_up: &FollowUpRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO follow_ups (id, context_id, question, answer, latency_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&follow_up.id)
        .bind(&follow_up.context_id)
        .bind(&follow_up.question)
        .bind(&follow_up.answer)
        .bind(follow_up.latency_ms)
        .bind(follow_up.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_follow_ups(&self, context_id: &str) -> StorageResult<Vec<FollowUpRecord>> {
        let rows: Vec<FollowUpRow> = sqlx::query_as(
            r#"
            SELECT id, context_id, question, answer, latency_ms, created_at
            FROM follow_ups
            WHERE context_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(context_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invocations (id, run_id, context_id, stage, persona, llm_provider, model_name,
                                     latency_ms, success, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invocation.id)
        .bind(&invocation.run_id)
        .bind(&invocation.context_id)
        .bind(&invocation.stage)
        .bind(&invocation.persona)
        .bind(&invocation.llm_provider)
        .bind(&invocation.model_name)
        .bind(invocation.latency_ms)
        .bind(invocation.success)
        .bind(&invocation.error)
        .bind(invocation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_context_invocations(&self, context_id: &str) -> StorageResult<Vec<Invocation>> {
        let rows: Vec<InvocationRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, context_id, stage, persona, llm_provider, model_name,
                   latency_ms, success, error, created_at
            FROM invocations
            WHERE context_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(context_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    context_id: String,
    assistant_id: String,
    input_idea: String,
    neutral_idea: String,
    assumptions: String,
    critiques: String,
    risk_signals: String,
    verdict: String,
    personas: String,
    latency_ms: i64,
    created_at: String,
}

impl From<RunRow> for RunRecord {
    fn from(row: RunRow) -> Self {
        Self {
            id: row.id,
            context_id: row.context_id,
            assistant_id: row.assistant_id,
            input_idea: row.input_idea,
            neutral_idea: row.neutral_idea,
            assumptions: row.assumptions,
            critiques: serde_json::from_str(&row.critiques).unwrap_or_default(),
            risk_signals: serde_json::from_str(&row.risk_signals).unwrap_or_default(),
            verdict: row.verdict,
            personas: serde_json::from_str(&row.personas).unwrap_or_default(),
            latency_ms: row.latency_ms,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct FollowUpRow {
    id: String,
    context_id: String,
    question: String,
    answer: String,
    latency_ms: i64,
    created_at: String,
}

impl From<FollowUpRow> for FollowUpRecord {
    fn from(row: FollowUpRow) -> Self {
        Self {
            id: row.id,
            context_id: row.context_id,
            question: row.question,
            answer: row.answer,
            latency_ms: row.latency_ms,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct InvocationRow {
    id: String,
    run_id: Option<String>,
    context_id: Option<String>,
    stage: String,
    persona: Option<String>,
    llm_provider: String,
    model_name: String,
    latency_ms: Option<i64>,
    success: bool,
    error: Option<String>,
    created_at: String,
}

impl From<InvocationRow> for Invocation {
    fn from(row: InvocationRow) -> Self {
        Self {
            id: row.id,
            run_id: row.run_id,
            context_id: row.context_id,
            stage: row.stage,
            persona: row.persona,
            llm_provider: row.llm_provider,
            model_name: row.model_name,
            latency_ms: row.latency_ms,
            success: row.success,
            error: row.error,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}
