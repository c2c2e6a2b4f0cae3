use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::core::{Exchange, LedgerScope, WorkflowCore};
use crate::error::{AppError, AppResult};
use crate::storage::FollowUpRecord;

/// A question asked in an earlier run's main-line context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpRequest {
    pub context_id: String,
    pub question: String,
}

/// Answer to a follow-up question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpResult {
    pub context_id: String,
    pub answer: String,
}

impl FollowUpRequest {
    pub fn new(context_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            question: question.into(),
        }
    }
}

/// Continues a main-line conversation with the main model.
pub struct FollowUpHandler<'a> {
    core: &'a WorkflowCore,
}

impl<'a> FollowUpHandler<'a> {
    pub fn new(core: &'a WorkflowCore) -> Self {
        Self { core }
    }

    /// Ask the question verbatim. Whether the context exists is up to the
    /// gateway.
    pub async fn ask(
        &self,
        request: &FollowUpRequest,
        cancel: &CancellationToken,
    ) -> AppResult<FollowUpResult> {
        let context_id = request.context_id.trim();
        if context_id.is_empty() {
            return Err(AppError::invalid_input(
                "context_id",
                "Context id cannot be empty",
            ));
        }
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::invalid_input(
                "question",
                "Question cannot be empty",
            ));
        }

        let start = Instant::now();
        let scope = LedgerScope {
            run_id: None,
            context_id: context_id.to_string(),
        };

        let answer = self
            .core
            .exchange(
                &scope,
                Exchange {
                    stage: "follow_up",
                    persona: None,
                    context_id,
                    prompt: question,
                    model: &self.core.models().main,
                },
                cancel,
            )
            .await?;

        let latency = start.elapsed().as_millis() as i64;
        let record = FollowUpRecord::new(context_id, question, &answer, latency);
        if let Err(e) = self.core.storage().save_follow_up(&record).await {
            warn!(context_id = %context_id, error = %e, "Failed to store follow-up");
        }

        info!(context_id = %context_id, latency_ms = latency, "Follow-up answered");

        Ok(FollowUpResult {
            context_id: context_id.to_string(),
            answer,
        })
    }
}
