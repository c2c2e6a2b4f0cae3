//! The stress-test workflow.
//!
//! A run is a fixed pipeline: neutralize the idea, extract assumptions, fan
//! out persona critiques, score risk convergence locally, then ask for a
//! verdict. All stages share [`WorkflowCore`] through composition.
//!
//! - [`CriticDispatcher`]: concurrent critiques in isolated contexts
//! - [`VerdictSynthesizer`]: final judgment in the main-line context
//! - [`FollowUpHandler`]: questions asked after a run

mod core;
mod critics;
mod follow_up;
mod verdict;


pub use self::core::*;
pub use critics::*;
pub use follow_up::*;
pub use verdict::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{RiskAnalyzer, RiskSignals};
use crate::config::{ModelConfig, RequestConfig};
use crate::error::{AppError, AppResult, StorageError};
use crate::gateway::ConversationGateway;
use crate::personas::{select_personas, Persona};
use crate::prompts::PromptStage;
use crate::storage::{FollowUpRecord, Invocation, RunRecord, Storage};

/// Input for one stress-test run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StressTestRequest {
    pub idea: String,
    /// Persona names to run. Unknown names are dropped; none left means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_critics: Option<Vec<String>>,
    /// Continue an existing main-line context instead of opening one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl StressTestRequest {
    pub fn new(idea: impl Into<String>) -> Self {
        Self {
            idea: idea.into(),
            ..Default::default()
        }
    }

    pub fn with_critics<I, S>(mut self, critics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_critics = Some(critics.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}

/// Bookkeeping attached to a run result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub assistant_id: String,
    /// Main-line context; pass it to follow-ups.
    pub context_id: String,
    pub personas: Vec<Persona>,
    pub models: ModelConfig,
    pub latency_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestResult {
    pub run_id: String,
    pub input_idea: String,
    pub neutral_idea: String,
    pub assumptions: String,
    pub critiques: BTreeMap<Persona, String>,
    pub risk_signals: RiskSignals,
    pub verdict: String,
    pub meta: RunMetadata,
    pub created_at: DateTime<Utc>,
}

/// Stored record of a main-line context.
#[derive(Debug, Clone, Serialize)]
pub struct RunHistory {
    pub context_id: String,
    pub runs: Vec<RunRecord>,
    pub follow_ups: Vec<FollowUpRecord>,
    pub invocations: Vec<Invocation>,
}

/// Health check result. Configuration only; no network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub gateway_configured: bool,
}

/// Runs stress tests and follow-ups against one assistant identity.
pub struct StressTestOrchestrator {
    core: WorkflowCore,
    analyzer: RiskAnalyzer,
}

impl StressTestOrchestrator {
    pub fn new(
        gateway: Arc<dyn ConversationGateway>,
        storage: Arc<dyn Storage>,
        models: ModelConfig,
        timing: RequestConfig,
        analyzer: RiskAnalyzer,
    ) -> Self {
        Self {
            core: WorkflowCore::new(gateway, storage, models, timing),
            analyzer,
        }
    }

    pub fn core(&self) -> &WorkflowCore {
        &self.core
    }

    pub fn analyzer(&self) -> &RiskAnalyzer {
        &self.analyzer
    }

    /// Run the full pipeline.
    ///
    /// Bounded by the configured run timeout; on expiry or when `cancel`
    /// fires, pending critic cleanups get the cleanup timeout and the run
    /// fails with [`AppError::Cancelled`].
    pub async fn run(
        &self,
        request: StressTestRequest,
        cancel: &CancellationToken,
    ) -> AppResult<StressTestResult> {
        let idea = request.idea.trim();
        if idea.is_empty() {
            return Err(AppError::invalid_input("idea", "Idea cannot be empty"));
        }
        let personas = select_personas(request.selected_critics.as_deref());
        let continued = request
            .context_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let run_cancel = cancel.child_token();
        let run_timeout = Duration::from_millis(self.core.timing().run_timeout_ms);

        let pipeline = self.execute(idea, &personas, continued, &run_cancel);
        tokio::pin!(pipeline);
        let deadline = tokio::time::sleep(run_timeout);
        tokio::pin!(deadline);

        tokio::select! {
            result = &mut pipeline => result,
            _ = &mut deadline => {
                warn!(
                    timeout_ms = self.core.timing().run_timeout_ms,
                    "Stress test exceeded run timeout, cancelling"
                );
                run_cancel.cancel();
                pipeline.await
            }
        }
    }

    async fn execute(
        &self,
        idea: &str,
        personas: &[Persona],
        continued_context: Option<&str>,
        cancel: &CancellationToken,
    ) -> AppResult<StressTestResult> {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let main_model = &self.core.models().main;

        let assistant_id = with_cancel(cancel, "assistant", self.core.assistant_id()).await?;

        let context_id = match continued_context {
            Some(id) => id.to_string(),
            None => {
                with_cancel(
                    cancel,
                    "context",
                    self.core.gateway().create_context(&assistant_id),
                )
                .await?
            }
        };
        let scope = LedgerScope {
            run_id: Some(run_id.clone()),
            context_id: context_id.clone(),
        };

        info!(
            run_id = %run_id,
            context_id = %context_id,
            critics = personas.len(),
            "Stress test started"
        );

        let bias_remover = PromptStage::BiasRemover { idea };
        let neutral_idea = self
            .core
            .exchange(
                &scope,
                Exchange {
                    stage: bias_remover.name(),
                    persona: None,
                    context_id: &context_id,
                    prompt: &bias_remover.render(),
                    model: main_model,
                },
                cancel,
            )
            .await?;

        let assumptions_stage = PromptStage::Assumptions {
            neutral_idea: &neutral_idea,
        };
        let assumptions = self
            .core
            .exchange(
                &scope,
                Exchange {
                    stage: assumptions_stage.name(),
                    persona: None,
                    context_id: &context_id,
                    prompt: &assumptions_stage.render(),
                    model: main_model,
                },
                cancel,
            )
            .await?;

        let outcomes = CriticDispatcher::new(&self.core)
            .dispatch(&scope, &assistant_id, &neutral_idea, personas, cancel)
            .await;
        let critiques = collect_critiques(outcomes)?;

        let risk_signals = self.analyzer.analyze(&critiques);
        debug!(note = %risk_signals.confidence_note, "Risk signals computed");

        let verdict = VerdictSynthesizer::new(&self.core)
            .synthesize(&scope, &neutral_idea, &assumptions, &critiques, cancel)
            .await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let result = StressTestResult {
            run_id,
            input_idea: idea.to_string(),
            neutral_idea,
            assumptions,
            critiques,
            risk_signals,
            verdict,
            meta: RunMetadata {
                assistant_id,
                context_id,
                personas: personas.to_vec(),
                models: self.core.models().clone(),
                latency_ms,
            },
            created_at: Utc::now(),
        };

        if let Err(e) = self.core.storage().save_run(&to_record(&result)?).await {
            warn!(run_id = %result.run_id, error = %e, "Failed to persist run");
        }

        info!(
            run_id = %result.run_id,
            latency_ms = latency_ms,
            high_confidence = result.risk_signals.high_confidence_risks.len(),
            "Stress test completed"
        );

        Ok(result)
    }

    /// Ask a question in an existing main-line context.
    pub async fn follow_up(
        &self,
        request: &FollowUpRequest,
        cancel: &CancellationToken,
    ) -> AppResult<FollowUpResult> {
        FollowUpHandler::new(&self.core).ask(request, cancel).await
    }

    /// Report whether the gateway credential is configured.
    pub fn health(&self) -> HealthReport {
        let configured = self.core.gateway().is_configured();
        HealthReport {
            status: if configured { "healthy" } else { "degraded" }.to_string(),
            gateway_configured: configured,
        }
    }

    /// Stored runs, follow-ups and invocations for a main-line context.
    pub async fn history(&self, context_id: &str) -> AppResult<RunHistory> {
        let context_id = context_id.trim();
        if context_id.is_empty() {
            return Err(AppError::invalid_input(
                "context_id",
                "Context id cannot be empty",
            ));
        }

        let storage = self.core.storage();
        let runs = storage.get_context_runs(context_id).await?;
        if runs.is_empty() {
            return Err(StorageError::RunNotFound {
                context_id: context_id.to_string(),
            }
            .into());
        }

        Ok(RunHistory {
            context_id: context_id.to_string(),
            runs,
            follow_ups: storage.get_follow_ups(context_id).await?,
            invocations: storage.get_context_invocations(context_id).await?,
        })
    }

    /// Most recent runs, newest first.
    pub async fn recent(&self, limit: u32) -> AppResult<Vec<RunRecord>> {
        Ok(self.core.storage().list_recent_runs(limit).await?)
    }
}

/// Fold critic outcomes into the critique map.
///
/// Cancellation wins over ordinary failures; otherwise every failed persona is
/// reported together.
fn collect_critiques(outcomes: Vec<CriticOutcome>) -> AppResult<BTreeMap<Persona, String>> {
    let mut critiques = BTreeMap::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(text) => {
                critiques.insert(outcome.persona, text);
            }
            Err(AppError::Cancelled { .. }) => {
                return Err(AppError::Cancelled {
                    stage: "critics".to_string(),
                });
            }
            Err(e) => failures.push((outcome.persona.as_str().to_string(), e.to_string())),
        }
    }

    if failures.is_empty() {
        Ok(critiques)
    } else {
        Err(AppError::CriticsFailed { failures })
    }
}

fn to_record(result: &StressTestResult) -> AppResult<RunRecord> {
    let encode = |e: serde_json::Error| AppError::Internal {
        message: format!("Failed to encode run: {}", e),
    };

    Ok(RunRecord {
        id: result.run_id.clone(),
        context_id: result.meta.context_id.clone(),
        assistant_id: result.meta.assistant_id.clone(),
        input_idea: result.input_idea.clone(),
        neutral_idea: result.neutral_idea.clone(),
        assumptions: result.assumptions.clone(),
        critiques: serde_json::to_value(&result.critiques).map_err(encode)?,
        risk_signals: serde_json::to_value(&result.risk_signals).map_err(encode)?,
        verdict: result.verdict.clone(),
        personas: result
            .meta
            .personas
            .iter()
            .map(|p| p.as_str().to_string())
            .collect(),
        latency_ms: result.meta.latency_ms as i64,
        created_at: result.created_at,
    })
}
