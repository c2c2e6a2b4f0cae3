//! Unit tests for Backboard API types.
//!
//! Covers identity extraction across the response shapes the API has used,
//! and the request bodies the client sends.

use super::*;
use crate::config::ModelBinding;
use serde_json::json;

#[test]
fn test_assistant_identity_snake_case() {
    let resp: AssistantResponse =
        serde_json::from_value(json!({"assistant_id": "asst-1", "name": "Idea Stress Tester"}))
            .unwrap();
    assert_eq!(resp.identity(), Some("asst-1"));
}

#[test]
fn test_assistant_identity_camel_case_and_plain_id() {
    let camel: AssistantResponse = serde_json::from_value(json!({"assistantId": "asst-2"})).unwrap();
    assert_eq!(camel.identity(), Some("asst-2"));

    let plain: AssistantResponse = serde_json::from_value(json!({"id": "asst-3"})).unwrap();
    assert_eq!(plain.identity(), Some("asst-3"));
}

#[test]
fn test_assistant_identity_prefers_assistant_id_when_both_present() {
    let resp: AssistantResponse =
        serde_json::from_value(json!({"assistant_id": "asst-a", "id": "row-9"})).unwrap();
    assert_eq!(resp.identity(), Some("asst-a"));
}

#[test]
fn test_missing_or_blank_identity() {
    let resp: AssistantResponse = serde_json::from_value(json!({"name": "x"})).unwrap();
    assert_eq!(resp.identity(), None);

    let blank: ThreadResponse = serde_json::from_value(json!({"thread_id": "  "})).unwrap();
    assert_eq!(blank.identity(), None);
}

#[test]
fn test_thread_identity_variants() {
    let snake: ThreadResponse = serde_json::from_value(json!({"thread_id": "t-1"})).unwrap();
    let camel: ThreadResponse = serde_json::from_value(json!({"threadId": "t-2"})).unwrap();
    let plain: ThreadResponse = serde_json::from_value(json!({"id": "t-3"})).unwrap();
    assert_eq!(snake.identity(), Some("t-1"));
    assert_eq!(camel.identity(), Some("t-2"));
    assert_eq!(plain.identity(), Some("t-3"));
}

#[test]
fn test_message_text_falls_back_to_message_field() {
    let content: MessageResponse =
        serde_json::from_value(json!({"content": "  verdict text \n"})).unwrap();
    assert_eq!(content.text(), "verdict text");

    let message: MessageResponse =
        serde_json::from_value(json!({"content": "", "message": "fallback"})).unwrap();
    assert_eq!(message.text(), "fallback");
}

#[test]
fn test_message_without_text_is_empty_not_error() {
    let resp: MessageResponse =
        serde_json::from_value(json!({"message_id": "m-1", "status": "COMPLETED"})).unwrap();
    assert_eq!(resp.text(), "");
}

#[test]
fn test_send_message_request_body() {
    let binding = ModelBinding::new("anthropic", "claude-3-7-sonnet-20250219");
    let req = SendMessageRequest::new("hello", &binding);
    let body = serde_json::to_value(&req).unwrap();
    assert_eq!(
        body,
        json!({
            "content": "hello",
            "llm_provider": "anthropic",
            "model_name": "claude-3-7-sonnet-20250219",
            "stream": false
        })
    );
}

#[test]
fn test_create_thread_request_omits_empty_metadata() {
    let body = serde_json::to_value(CreateThreadRequest::default()).unwrap();
    assert_eq!(body, json!({}));
}

#[test]
fn test_create_assistant_request_body() {
    let body = serde_json::to_value(CreateAssistantRequest::new("n", "d")).unwrap();
    assert_eq!(body, json!({"name": "n", "description": "d"}));
}
