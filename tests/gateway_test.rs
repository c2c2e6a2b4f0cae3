//! Integration tests for the Backboard client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use idea_stress_tester::config::{GatewayConfig, ModelBinding, RequestConfig};
use idea_stress_tester::error::GatewayError;
use idea_stress_tester::gateway::{BackboardClient, ConversationGateway};

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str, max_retries: u32) -> BackboardClient {
    let config = GatewayConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 10,
        ..RequestConfig::default()
    };

    BackboardClient::new(&config, request_config).expect("Failed to create client")
}

#[cfg(test)]
mod assistant_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assistant_sends_key_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/assistants"))
            .and(header("X-API-Key", "test-api-key"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({
                "name": "Idea Stress Tester",
                "description": "Critiques ideas"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "assistant_id": "asst-123",
                "name": "Idea Stress Tester"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let id = client
            .create_assistant("Idea Stress Tester", "Critiques ideas")
            .await
            .unwrap();

        assert_eq!(id, "asst-123");
    }

    #[tokio::test]
    async fn test_create_assistant_accepts_camel_case_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/assistants"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"assistantId": "asst-camel"})),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let id = client.create_assistant("n", "d").await.unwrap();
        assert_eq!(id, "asst-camel");
    }

    #[tokio::test]
    async fn test_create_assistant_without_id_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/assistants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "x"})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let err = client.create_assistant("n", "d").await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingIdentity { field } if field == "assistant_id"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/assistants"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let err = client.create_assistant("n", "d").await.unwrap_err();
        match err {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[cfg(test)]
mod thread_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_context_uses_assistant_path() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/assistants/asst-1/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"thread_id": "t-9"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        assert_eq!(client.create_context("asst-1").await.unwrap(), "t-9");
    }

    #[tokio::test]
    async fn test_create_context_falls_back_to_plain_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/assistants/asst-1/threads"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "t-plain"})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        assert_eq!(client.create_context("asst-1").await.unwrap(), "t-plain");
    }

    #[tokio::test]
    async fn test_delete_context_retries_until_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/threads/t-1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/threads/t-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        client.delete_context("t-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_context_counts_as_deleted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/threads/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        client.delete_context("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_context_gives_up_after_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/threads/t-2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let err = client.delete_context("t-2").await.unwrap_err();
        match err {
            GatewayError::Unavailable { message, retries } => {
                assert_eq!(retries, 3);
                assert!(message.contains("down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[cfg(test)]
mod message_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_message_routes_model_and_returns_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/threads/t-1/messages"))
            .and(body_json(json!({
                "content": "Critique this",
                "llm_provider": "anthropic",
                "model_name": "claude-3-5-sonnet",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "  A sharp critique.  ",
                "message_id": "m-1"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let text = client
            .send_message(
                "t-1",
                "Critique this",
                &ModelBinding::new("anthropic", "claude-3-5-sonnet"),
            )
            .await
            .unwrap();

        assert_eq!(text, "A sharp critique.");
    }

    #[tokio::test]
    async fn test_send_message_falls_back_to_message_field() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/threads/t-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "hello"})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let text = client
            .send_message("t-1", "hi", &ModelBinding::default())
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_send_message_without_text_is_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/threads/t-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "m"})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let text = client
            .send_message("t-1", "hi", &ModelBinding::default())
            .await
            .unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_send_message_is_never_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/threads/t-1/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let err = client
            .send_message("t-1", "hi", &ModelBinding::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/threads/t-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let err = client
            .send_message("t-1", "hi", &ModelBinding::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse { .. }));
    }
}
