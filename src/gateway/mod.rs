//! Conversation gateway.
//!
//! [`ConversationGateway`] is the one contract the workflow depends on:
//! assistant registration, thread (conversation context) lifecycle, and
//! message completion. [`BackboardClient`] implements it over the Backboard
//! REST API.

mod client;
mod types;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use client::BackboardClient;
pub use types::*;

use async_trait::async_trait;

use crate::config::ModelBinding;
use crate::error::GatewayResult;

/// Remote conversational backend, as seen by the workflow.
///
/// Operations within one context are serialized by the backend; callers that
/// need concurrency open separate contexts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationGateway: Send + Sync {
    /// Register an assistant identity and return its id.
    async fn create_assistant(&self, name: &str, description: &str) -> GatewayResult<String>;

    /// Open a conversation context under an assistant and return its id.
    async fn create_context(&self, assistant_id: &str) -> GatewayResult<String>;

    /// Destroy a conversation context.
    async fn delete_context(&self, context_id: &str) -> GatewayResult<()>;

    /// Append a message to a context and return the completion text.
    ///
    /// An empty string is a valid completion.
    async fn send_message(
        &self,
        context_id: &str,
        content: &str,
        model: &ModelBinding,
    ) -> GatewayResult<String>;

    /// Whether a non-empty credential is configured. No network call.
    fn is_configured(&self) -> bool;
}
