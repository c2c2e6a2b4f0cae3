use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use super::core::{Exchange, LedgerScope, WorkflowCore};
use crate::error::AppResult;
use crate::personas::Persona;
use crate::prompts::PromptStage;

/// Final judgment over everything the run produced.
pub struct VerdictSynthesizer<'a> {
    core: &'a WorkflowCore,
}

impl<'a> VerdictSynthesizer<'a> {
    pub fn new(core: &'a WorkflowCore) -> Self {
        Self { core }
    }

    /// One exchange in the main-line context with the main model.
    pub async fn synthesize(
        &self,
        scope: &LedgerScope,
        neutral_idea: &str,
        assumptions: &str,
        critiques: &BTreeMap<Persona, String>,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        let stage = PromptStage::FinalJudge {
            neutral_idea,
            assumptions,
            critiques,
        };
        let prompt = stage.render();

        self.core
            .exchange(
                scope,
                Exchange {
                    stage: stage.name(),
                    persona: None,
                    context_id: &scope.context_id,
                    prompt: &prompt,
                    model: &self.core.models().main,
                },
                cancel,
            )
            .await
    }
}
