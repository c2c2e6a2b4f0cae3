//! Infrastructure shared by every workflow stage.
//!
//! [`WorkflowCore`] owns the gateway, the storage ledger, the model bindings
//! and the process-wide assistant identity.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ModelBinding, ModelConfig, RequestConfig};
use crate::error::{AppError, AppResult, GatewayError, GatewayResult};
use crate::gateway::ConversationGateway;
use crate::personas::Persona;
use crate::prompts::{ASSISTANT_DESCRIPTION, ASSISTANT_NAME};
use crate::storage::{Invocation, Storage};

/// Where ledger entries for an exchange are filed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerScope {
    pub run_id: Option<String>,
    /// Main-line context the exchange belongs to.
    pub context_id: String,
}

/// One prompt sent to one context.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub stage: &'a str,
    pub persona: Option<Persona>,
    /// Context the message is appended to.
    pub context_id: &'a str,
    pub prompt: &'a str,
    pub model: &'a ModelBinding,
}

/// Core infrastructure shared by all workflow stages.
pub struct WorkflowCore {
    gateway: Arc<dyn ConversationGateway>,
    storage: Arc<dyn Storage>,
    models: ModelConfig,
    timing: RequestConfig,
    assistant: OnceCell<String>,
}

impl WorkflowCore {
    /// Create a new core with no assistant identity yet.
    pub fn new(
        gateway: Arc<dyn ConversationGateway>,
        storage: Arc<dyn Storage>,
        models: ModelConfig,
        timing: RequestConfig,
    ) -> Self {
        Self {
            gateway,
            storage,
            models,
            timing,
            assistant: OnceCell::new(),
        }
    }

    #[inline]
    pub fn gateway(&self) -> &dyn ConversationGateway {
        self.gateway.as_ref()
    }

    #[inline]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    #[inline]
    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    #[inline]
    pub fn timing(&self) -> &RequestConfig {
        &self.timing
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.cleanup_timeout_ms)
    }

    /// The assistant identity, registering it on first use.
    ///
    /// Concurrent first callers share one registration. A failed registration
    /// leaves the cell empty so a later call tries again.
    pub async fn assistant_id(&self) -> GatewayResult<String> {
        self.assistant
            .get_or_try_init(|| async {
                let id = self
                    .gateway
                    .create_assistant(ASSISTANT_NAME, ASSISTANT_DESCRIPTION)
                    .await?;
                info!(assistant_id = %id, "Assistant identity registered");
                Ok::<_, GatewayError>(id)
            })
            .await
            .cloned()
    }

    /// Cached assistant identity, if one was registered.
    pub fn cached_assistant_id(&self) -> Option<&str> {
        self.assistant.get().map(String::as_str)
    }

    /// Send one prompt, racing the cancellation token, and file a ledger entry.
    pub async fn exchange(
        &self,
        scope: &LedgerScope,
        exchange: Exchange<'_>,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        let start = Instant::now();
        debug!(
            stage = exchange.stage,
            context_id = %exchange.context_id,
            model = %exchange.model.model_name,
            "Stage started"
        );

        let result = with_cancel(
            cancel,
            exchange.stage,
            self.gateway
                .send_message(exchange.context_id, exchange.prompt, exchange.model),
        )
        .await;
        let latency = start.elapsed().as_millis() as i64;

        let mut invocation = Invocation::new(exchange.stage, exchange.model)
            .with_context(&scope.context_id);
        if let Some(run_id) = &scope.run_id {
            invocation = invocation.with_run(run_id);
        }
        if let Some(persona) = exchange.persona {
            invocation = invocation.with_persona(persona.as_str());
        }
        invocation = match &result {
            Ok(_) => invocation.success(latency),
            Err(e) => invocation.failure(e.to_string(), latency),
        };
        self.record(&invocation).await;

        match &result {
            Ok(text) => info!(
                stage = exchange.stage,
                latency_ms = latency,
                chars = text.len(),
                "Stage completed"
            ),
            Err(e) => warn!(
                stage = exchange.stage,
                latency_ms = latency,
                error = %e,
                "Stage failed"
            ),
        }

        result
    }

    /// Ledger writes never fail the run.
    async fn record(&self, invocation: &Invocation) {
        if let Err(e) = self.storage.log_invocation(invocation).await {
            warn!(
                stage = %invocation.stage,
                error = %e,
                "Failed to record invocation"
            );
        }
    }
}

/// Await a gateway call unless the token fires first.
pub async fn with_cancel<T, F>(cancel: &CancellationToken, stage: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled {
            stage: stage.to_string(),
        }),
        result = fut => result.map_err(AppError::from),
    }
}
