//! Concurrent persona critiques.
//!
//! Each persona gets its own conversation context so critiques never queue
//! behind each other in one thread. Contexts are destroyed whatever happens to
//! the critique.

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::core::{Exchange, LedgerScope, WorkflowCore};
use crate::error::{AppError, AppResult};
use crate::personas::Persona;
use crate::prompts::PromptStage;

/// Result of one persona's critique.
#[derive(Debug)]
pub struct CriticOutcome {
    pub persona: Persona,
    pub result: AppResult<String>,
}

/// Runs persona critiques in parallel isolated contexts.
pub struct CriticDispatcher<'a> {
    core: &'a WorkflowCore,
}

impl<'a> CriticDispatcher<'a> {
    pub fn new(core: &'a WorkflowCore) -> Self {
        Self { core }
    }

    /// Run every persona and wait for all of them.
    ///
    /// Returns one outcome per persona, in the order given.
    pub async fn dispatch(
        &self,
        scope: &LedgerScope,
        assistant_id: &str,
        neutral_idea: &str,
        personas: &[Persona],
        cancel: &CancellationToken,
    ) -> Vec<CriticOutcome> {
        debug!(critics = personas.len(), "Dispatching critics");

        join_all(personas.iter().map(|persona| {
            self.run_critic(scope, assistant_id, neutral_idea, *persona, cancel)
        }))
        .await
    }

    async fn run_critic(
        &self,
        scope: &LedgerScope,
        assistant_id: &str,
        neutral_idea: &str,
        persona: Persona,
        cancel: &CancellationToken,
    ) -> CriticOutcome {
        let prompt = PromptStage::Critic {
            persona,
            neutral_idea,
        }
        .render();

        let context_id = match self.open_context(persona, assistant_id, cancel).await {
            Ok(id) => id,
            Err(e) => {
                warn!(persona = %persona, error = %e, "Could not open critic context");
                return CriticOutcome {
                    persona,
                    result: Err(e),
                };
            }
        };

        let result = self
            .core
            .exchange(
                scope,
                Exchange {
                    stage: persona.as_str(),
                    persona: Some(persona),
                    context_id: &context_id,
                    prompt: &prompt,
                    model: self.core.models().for_persona(persona),
                },
                cancel,
            )
            .await;

        self.cleanup(persona, &context_id).await;

        CriticOutcome { persona, result }
    }

    /// Create the critic's context.
    ///
    /// A creation already in flight when the run is cancelled is allowed the
    /// cleanup timeout to finish, and the context it returns is deleted.
    async fn open_context(
        &self,
        persona: Persona,
        assistant_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        if cancel.is_cancelled() {
            return Err(cancelled(persona));
        }

        let create = self.core.gateway().create_context(assistant_id);
        tokio::pin!(create);

        tokio::select! {
            result = &mut create => result.map_err(AppError::from),
            _ = cancel.cancelled() => {
                match tokio::time::timeout(self.core.cleanup_timeout(), &mut create).await {
                    Ok(Ok(context_id)) => self.cleanup(persona, &context_id).await,
                    Ok(Err(e)) => debug!(
                        persona = %persona,
                        error = %e,
                        "Critic context creation failed after cancellation"
                    ),
                    Err(_) => warn!(
                        persona = %persona,
                        timeout_ms = self.core.timing().cleanup_timeout_ms,
                        "Abandoned critic context creation after cancellation"
                    ),
                }
                Err(cancelled(persona))
            }
        }
    }

    /// Delete a critic context. Failures are logged, never returned.
    ///
    /// The deletion gets the cleanup timeout and is abandoned after it, so a
    /// hung backend never holds back the critique.
    async fn cleanup(&self, persona: Persona, context_id: &str) {
        let delete = self.core.gateway().delete_context(context_id);

        match tokio::time::timeout(self.core.cleanup_timeout(), delete).await {
            Ok(Ok(())) => {
                debug!(persona = %persona, context_id = %context_id, "Critic context deleted")
            }
            Ok(Err(e)) => warn!(
                persona = %persona,
                context_id = %context_id,
                error = %e,
                "Failed to delete critic context"
            ),
            Err(_) => warn!(
                persona = %persona,
                context_id = %context_id,
                timeout_ms = self.core.timing().cleanup_timeout_ms,
                "Abandoned critic context cleanup"
            ),
        }
    }
}

fn cancelled(persona: Persona) -> AppError {
    AppError::Cancelled {
        stage: persona.as_str().to_string(),
    }
}
