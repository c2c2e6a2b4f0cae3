use serde::{Deserialize, Serialize};

use crate::config::ModelBinding;

/// Request to register an assistant
#[derive(Debug, Clone, Serialize)]
pub struct CreateAssistantRequest {
    pub name: String,
    pub description: String,
}

/// Response from registering an assistant.
///
/// Backboard has returned the identifier under several names across API
/// versions; all of them are accepted here and nowhere else.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantResponse {
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default, rename = "assistantId")]
    pub assistant_id_camel: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to open a thread under an assistant
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateThreadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response from opening a thread
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadResponse {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default, rename = "threadId")]
    pub thread_id_camel: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Request to append a message to a thread and get a completion
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub llm_provider: String,
    pub model_name: String,
    /// Always false; the orchestrator needs the whole completion.
    pub stream: bool,
}

/// Response from appending a message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub model_provider: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

fn first_non_empty<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

impl CreateAssistantRequest {
    /// Create a new assistant registration request
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl AssistantResponse {
    /// The assistant identifier, whichever field carried it
    pub fn identity(&self) -> Option<&str> {
        first_non_empty(&[&self.assistant_id, &self.assistant_id_camel, &self.id])
    }
}

impl ThreadResponse {
    /// The thread identifier, whichever field carried it
    pub fn identity(&self) -> Option<&str> {
        first_non_empty(&[&self.thread_id, &self.thread_id_camel, &self.id])
    }
}

impl SendMessageRequest {
    /// Create a non-streaming message request routed to a model binding
    pub fn new(content: impl Into<String>, model: &ModelBinding) -> Self {
        Self {
            content: content.into(),
            llm_provider: model.llm_provider.clone(),
            model_name: model.model_name.clone(),
            stream: false,
        }
    }
}

impl MessageResponse {
    /// Completion text, trimmed. Empty when the response carried none.
    pub fn text(&self) -> String {
        first_non_empty(&[&self.content, &self.message])
            .unwrap_or_default()
            .to_string()
    }
}
