//! Integration tests for OpenAI provider
//!
//! Tests behavioral contracts without testing implementation details:
//! - API request/response handling
//! - Error scenarios (rate limits, auth failures, server errors)
//! - Retry logic for transient failures
//! - Token usage tracking
//! - Use as the execution backend of a crew

use crewline::crew::{AgentDescriptor, Crew, LlmBackend, TaskDescriptor};
use crewline::llm::provider::{CompletionRequest, FinishReason, LlmError, LlmProvider, Message};
use crewline::llm::providers::openai::{OpenAiConfig, OpenAiProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> OpenAiConfig {
    OpenAiConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn test_request(model: &str) -> CompletionRequest {
    let mut request = CompletionRequest::new(model, vec![Message::user("Hello")]);
    request.max_tokens = Some(100);
    request.temperature = Some(0.7);
    request
}

fn completion_body(content: &str, finish_reason: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": "gpt-4",
        "choices": [
            {
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": finish_reason
            }
        ],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 15,
            "total_tokens": 25
        }
    })
}

#[tokio::test]
async fn test_openai_provider_returns_successful_completion_with_valid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("Hello! How can I assist you today?", "stop")),
        )
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    let response = provider.complete(test_request("gpt-4")).await.unwrap();

    assert_eq!(
        response.content,
        Some("Hello! How can I assist you today?".to_string())
    );
    assert_eq!(response.model, "gpt-4");
    assert_eq!(response.usage.prompt_tokens, 10);
    assert_eq!(response.usage.completion_tokens, 15);
    assert_eq!(response.usage.total_tokens, 25);
    assert_eq!(response.finish_reason, FinishReason::Stop);
}

#[tokio::test]
async fn test_openai_provider_sends_model_and_sampling_settings() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 100
        })))
        .and(body_string_contains(
            r#"{"role":"system","content":"You are a planner."}"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok", "stop")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let mut request = CompletionRequest::new(
        "gpt-3.5-turbo",
        vec![Message::system("You are a planner."), Message::user("Hello")],
    );
    request.max_tokens = Some(100);

    provider.complete(request).await.unwrap();
}

#[tokio::test]
async fn test_openai_provider_returns_error_when_api_responds_with_401() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"error": {"message": "Incorrect API key provided"}}"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    let result = provider.complete(test_request("gpt-4")).await;

    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_openai_provider_returns_error_when_api_responds_with_429() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string(
            r#"{"error": {"message": "Rate limit exceeded", "type": "rate_limit_error"}}"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    match provider.complete(test_request("gpt-4")).await.unwrap_err() {
        LlmError::RateLimitExceeded(msg) => assert!(msg.contains("Rate limit exceeded")),
        other => panic!("Expected RateLimitExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_provider_does_not_retry_client_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error": {"message": "This model's maximum context length is 4097 tokens"}}"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    match provider.complete(test_request("gpt-4")).await.unwrap_err() {
        LlmError::ApiError(msg) => {
            assert!(msg.contains("400"));
            assert!(msg.contains("maximum context length"));
        }
        other => panic!("Expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_provider_retries_on_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service temporarily unavailable"))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("Success after retry", "stop")),
        )
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    let response = provider.complete(test_request("gpt-4")).await.unwrap();
    assert_eq!(response.content.as_deref(), Some("Success after retry"));
}

#[tokio::test]
async fn test_openai_provider_fails_after_all_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service unavailable"))
        .expect(4)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    let result = provider.complete(test_request("gpt-4")).await;
    assert!(matches!(result, Err(LlmError::ApiError(_))));
}

#[tokio::test]
async fn test_openai_provider_converts_length_finish_reason() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("Truncated...", "length")),
        )
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    let response = provider.complete(test_request("gpt-4")).await.unwrap();
    assert_eq!(response.finish_reason, FinishReason::Length);
}

#[tokio::test]
async fn test_openai_provider_returns_error_when_choices_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gpt-4",
            "choices": [],
            "usage": {"prompt_tokens": 10, "completion_tokens": 0, "total_tokens": 10}
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    match provider.complete(test_request("gpt-4")).await.unwrap_err() {
        LlmError::ApiError(msg) => assert!(msg.contains("No choices")),
        other => panic!("Expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_provider_tolerates_missing_usage() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "local-model",
            "choices": [
                {"message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    let response = provider.complete(test_request("local-model")).await.unwrap();
    assert_eq!(response.usage.total_tokens, 0);
    assert_eq!(response.content.as_deref(), Some("hi"));
}

#[tokio::test]
async fn test_openai_provider_returns_error_when_json_parsing_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    let result = provider.complete(test_request("gpt-4")).await;
    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_openai_health_check_succeeds_when_models_endpoint_available() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [{"id": "gpt-4", "object": "model"}]
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(provider.health_check().await.is_ok());
}

#[tokio::test]
async fn test_openai_health_check_fails_when_auth_invalid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();

    let result = provider.health_check().await;
    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_openai_provider_preserves_request_metadata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok", "stop")))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let mut request = test_request("gpt-4");
    request.metadata = HashMap::from([("agent_id".to_string(), "planner".to_string())]);

    let response = provider.complete(request).await.unwrap();
    assert_eq!(
        response.metadata.get("agent_id").map(String::as_str),
        Some("planner")
    );
}

#[tokio::test]
async fn test_article_crew_over_openai_wire() {
    let mock_server = MockServer::start().await;

    for (marker, reply) in [
        ("Current Task: Outline", "OUTLINE"),
        ("Current Task: Write", "DRAFT"),
        ("Current Task: Proofread", "FINAL"),
    ] {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(marker))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(reply, "stop")))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let agent = |id: &str, role: &str| {
        Arc::new(AgentDescriptor::new(
            id,
            role,
            "Handle {topic}",
            "You are part of a newsroom.",
        ))
    };
    let tasks = vec![
        TaskDescriptor::new("Outline {topic}", "An outline", agent("planner", "Planner")),
        TaskDescriptor::new("Write the article", "Markdown", agent("writer", "Writer")),
        TaskDescriptor::new("Proofread the article", "Markdown", agent("editor", "Editor")),
    ];

    let provider = Arc::new(OpenAiProvider::new(test_config(&mock_server.uri())).unwrap());
    let crew = Crew::new(tasks, Arc::new(LlmBackend::new(provider, "gpt-4")));

    let inputs = HashMap::from([("topic".to_string(), "Rust".to_string())]);
    let output = crew.kickoff(&inputs).await.unwrap();

    assert_eq!(output.final_output, "FINAL");
    assert_eq!(output.token_usage.total_tokens, 75);
}
