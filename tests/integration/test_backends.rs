use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use waveline::core::collaborator::{
    CollaboratorError, CompletionBackend, DecisionCollaborator, GroqBackend, LlmCollaborator,
    OpenAiBackend, ResponseFormat,
};
use waveline::core::config::{GroqConfig, OpenAiConfig};
use waveline::core::error::StepError;
use waveline::core::steps::{DecisionRecord, StepProjection};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_backend(server: &MockServer) -> OpenAiBackend {
    let config = OpenAiConfig {
        base_url: format!("{}/v1", server.uri()),
        ..Default::default()
    };
    OpenAiBackend::new(config, "sk-test".to_string(), Duration::from_secs(5)).unwrap()
}

fn groq_backend(server: &MockServer) -> GroqBackend {
    let config = GroqConfig {
        base_url: format!("{}/openai/v1", server.uri()),
        ..Default::default()
    };
    GroqBackend::new(config, "gsk-test".to_string(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn openai_posts_responses_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4.1", "input": "Title this"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "output": [
                {"type": "message", "content": [{"type": "output_text", "text": "Budget Gate"}]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = openai_backend(&server)
        .complete("Title this", ResponseFormat::Text)
        .await
        .unwrap();

    assert_eq!(reply, "Budget Gate");
}

#[tokio::test]
async fn openai_non_success_status_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = openai_backend(&server)
        .complete("Title this", ResponseFormat::Text)
        .await
        .unwrap_err();

    match err {
        CollaboratorError::ServerError { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn groq_sends_sampling_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer gsk-test"))
        .and(body_partial_json(json!({
            "model": "meta-llama/llama-4-maverick-17b-128e-instruct",
            "temperature": 0.3,
            "max_completion_tokens": 2000,
            "top_p": 1.0,
            "stream": false,
            "messages": [{"role": "user", "content": "Pick a group"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "finance"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = groq_backend(&server)
        .complete("Pick a group", ResponseFormat::Text)
        .await
        .unwrap();

    assert_eq!(reply, "finance");
}

#[tokio::test]
async fn json_requests_carry_the_json_reminder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(body_partial_json(json!({
            "input": "List decisions Remember your answer must be in valid JSON format"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output_text": "[]"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{
                "role": "user",
                "content": "List decisions Remember your answer must be in valid JSON format"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "[]"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let openai = openai_backend(&server)
        .complete("List decisions", ResponseFormat::Json)
        .await
        .unwrap();
    let groq = groq_backend(&server)
        .complete("List decisions", ResponseFormat::Json)
        .await
        .unwrap();

    assert_eq!(openai, "[]");
    assert_eq!(groq, "[]");
}

#[tokio::test]
async fn groq_without_choices_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = groq_backend(&server)
        .complete("Pick a group", ResponseFormat::Text)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CollaboratorError::EmptyResponse { provider: "groq" }
    ));
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let config = OpenAiConfig {
        base_url: "http://127.0.0.1:1/v1".to_string(),
        ..Default::default()
    };
    let backend =
        OpenAiBackend::new(config, "sk-test".to_string(), Duration::from_secs(5)).unwrap();

    let err = backend
        .complete("Title this", ResponseFormat::Text)
        .await
        .unwrap_err();

    assert!(matches!(err, CollaboratorError::NetworkError(_)));
}

#[tokio::test]
async fn classifier_reply_in_code_fence_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output_text": "```json\n[{\"order\": 2, \"yes_step\": 3, \"no_step\": 1}]\n```"
        })))
        .mount(&server)
        .await;
    let collaborator = LlmCollaborator::new(Arc::new(openai_backend(&server)));
    let steps = vec![
        StepProjection {
            order: 1,
            content: "install deps".into(),
        },
        StepProjection {
            order: 2,
            content: "approve release?".into(),
        },
    ];

    let records = collaborator.classify(&steps, &["rule"]).await.unwrap();

    assert_eq!(records, vec![DecisionRecord::new(2, 3, 1)]);
}

#[tokio::test]
async fn classifier_prose_reply_is_format_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output_text": "Step 2 looks like a decision."
        })))
        .mount(&server)
        .await;
    let collaborator = LlmCollaborator::new(Arc::new(openai_backend(&server)));

    let err = collaborator.classify(&[], &["rule"]).await.unwrap_err();

    match err {
        StepError::CollaboratorFormat { raw, .. } => {
            assert_eq!(raw, "Step 2 looks like a decision.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
