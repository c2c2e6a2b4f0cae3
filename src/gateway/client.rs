use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{
    AssistantResponse, CreateAssistantRequest, CreateThreadRequest, MessageResponse,
    SendMessageRequest, ThreadResponse,
};
use super::ConversationGateway;
use crate::config::{GatewayConfig, ModelBinding, RequestConfig};
use crate::error::{GatewayError, GatewayResult};

/// Client for the Backboard assistants/threads API
#[derive(Clone)]
pub struct BackboardClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl BackboardClient {
    /// Create a new Backboard client
    pub fn new(config: &GatewayConfig, request_config: RequestConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GatewayError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-API-Key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    /// Send a request and reject non-success statuses
    async fn send(&self, builder: RequestBuilder) -> GatewayResult<Response> {
        let response = self.authorized(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    timeout_ms: self.request_config.timeout_ms,
                }
            } else {
                GatewayError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> GatewayResult<T> {
        response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse {
                message: format!("Failed to parse {} response: {}", what, e),
            })
    }

    /// Single delete attempt (internal)
    async fn execute_delete(&self, url: &str) -> GatewayResult<()> {
        match self.send(self.client.delete(url)).await {
            Ok(_) => Ok(()),
            // Already gone counts as deleted
            Err(GatewayError::Api { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ConversationGateway for BackboardClient {
    async fn create_assistant(&self, name: &str, description: &str) -> GatewayResult<String> {
        let url = format!("{}/assistants", self.base_url);
        info!(assistant = %name, "Creating Backboard assistant");

        let request = CreateAssistantRequest::new(name, description);
        let response = self.send(self.client.post(&url).json(&request)).await?;
        let body: AssistantResponse = Self::parse(response, "create assistant").await?;

        let id = body
            .identity()
            .ok_or_else(|| GatewayError::MissingIdentity {
                field: "assistant_id".to_string(),
            })?
            .to_string();

        info!(assistant_id = %id, "Assistant ready");
        Ok(id)
    }

    async fn create_context(&self, assistant_id: &str) -> GatewayResult<String> {
        let url = format!("{}/assistants/{}/threads", self.base_url, assistant_id);

        let response = self
            .send(self.client.post(&url).json(&CreateThreadRequest::default()))
            .await?;
        let body: ThreadResponse = Self::parse(response, "create thread").await?;

        let id = body
            .identity()
            .ok_or_else(|| GatewayError::MissingIdentity {
                field: "thread_id".to_string(),
            })?
            .to_string();

        debug!(thread_id = %id, assistant_id = %assistant_id, "Thread created");
        Ok(id)
    }

    async fn delete_context(&self, context_id: &str) -> GatewayResult<()> {
        let url = format!("{}/threads/{}", self.base_url, context_id);

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = backoff_delay(self.request_config.retry_delay_ms, retries);
                warn!(
                    thread_id = %context_id,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying thread deletion"
                );
                tokio::time::sleep(delay).await;
            }

            match self.execute_delete(&url).await {
                Ok(()) => {
                    debug!(thread_id = %context_id, "Thread deleted");
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        thread_id = %context_id,
                        error = %e,
                        retry = retries,
                        "Thread deletion failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(GatewayError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    async fn send_message(
        &self,
        context_id: &str,
        content: &str,
        model: &ModelBinding,
    ) -> GatewayResult<String> {
        let url = format!("{}/threads/{}/messages", self.base_url, context_id);
        let request = SendMessageRequest::new(content, model);

        debug!(
            thread_id = %context_id,
            provider = %model.llm_provider,
            model = %model.model_name,
            chars = content.len(),
            "Sending message"
        );

        let start = Instant::now();
        let result = async {
            let response = self.send(self.client.post(&url).json(&request)).await?;
            Self::parse::<MessageResponse>(response, "message").await
        }
        .await;
        let latency = start.elapsed();

        match result {
            Ok(body) => {
                info!(
                    thread_id = %context_id,
                    latency_ms = latency.as_millis(),
                    "Message completed"
                );
                Ok(body.text())
            }
            Err(e) => {
                error!(
                    thread_id = %context_id,
                    error = %e,
                    latency_ms = latency.as_millis(),
                    "Message failed"
                );
                Err(e)
            }
        }
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Exponential backoff before retry `attempt` (1-based), saturating at the
/// largest representable delay.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}
