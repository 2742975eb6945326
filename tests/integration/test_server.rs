use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;
use std::env;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{sync::oneshot, task::JoinHandle};
use waveline::core::collaborator::DecisionCollaborator;
use waveline::core::config::{ReconcileConfig, ServerConfig};
use waveline::core::error::{AppError, StepError};
use waveline::core::pipeline::DecisionPipeline;
use waveline::core::steps::{DecisionRecord, StepProjection};
use waveline::core::types::ErrorCategory;
use waveline::server;

const KEY_ENV: &str = "WAVELINE_TEST_SERVER_KEY";

struct ApiKeyGuard(Option<OsString>);

impl ApiKeyGuard {
    fn set(key: &str) -> Self {
        let previous = env::var_os(KEY_ENV);
        env::set_var(KEY_ENV, key);
        ApiKeyGuard(previous)
    }
}

impl Drop for ApiKeyGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.0.take() {
            env::set_var(KEY_ENV, previous);
        } else {
            env::remove_var(KEY_ENV);
        }
    }
}

/// Classifies every step whose content ends in '?' as a decision pointing forward and back.
struct QuestionMarkCollaborator;

#[async_trait]
impl DecisionCollaborator for QuestionMarkCollaborator {
    async fn classify(
        &self,
        steps: &[StepProjection],
        _rules: &[&str],
    ) -> Result<Vec<DecisionRecord>, StepError> {
        Ok(steps
            .iter()
            .filter(|step| step.content.ends_with('?'))
            .map(|step| DecisionRecord::new(step.order, step.order + 1, step.order - 1))
            .collect())
    }

    async fn title(&self, _task: &[String]) -> Result<String, StepError> {
        Ok("Approval".to_string())
    }

    async fn group(&self, _task: &[String], groups: &[String]) -> Result<String, StepError> {
        Ok(groups[0].clone())
    }
}

async fn spawn_server(max_body_bytes: usize) -> Result<(SocketAddr, JoinHandle<Result<(), AppError>>)> {
    let pipeline = Arc::new(DecisionPipeline::new(
        Arc::new(QuestionMarkCollaborator),
        &ReconcileConfig::default(),
    ));
    let settings = ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        api_key_env: KEY_ENV.to_string(),
        max_body_bytes,
    };
    let (addr_tx, addr_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        server::serve_with_ready_notifier(pipeline, &settings, addr_tx).await
    });
    let addr = addr_rx.await.map_err(|_| {
        AppError::new(
            ErrorCategory::InternalError,
            "server startup canceled before bind address reported",
        )
    })?;
    Ok((addr, handle))
}

fn build_url(addr: SocketAddr) -> String {
    format!("http://{}/api/v1/buildDecisionSteps", addr)
}

fn plan() -> Value {
    json!([
        {"order": 1, "group": "setup", "content": "install deps"},
        {"order": 2, "group": "build", "content": "approve release?"},
        {"order": 3, "group": "ship", "content": "deploy"}
    ])
}

#[tokio::test]
#[serial]
async fn rejects_missing_or_wrong_api_key() -> Result<()> {
    let _key = ApiKeyGuard::set("valid-key");
    let (addr, handle) = spawn_server(1024 * 1024).await?;
    let client = reqwest::Client::new();

    let resp = client.post(build_url(addr)).json(&plan()).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "WAVELINE-401");
    assert_eq!(
        body["error"]["message"],
        "Error: 401 - Invalid or missing API key"
    );

    let resp = client
        .post(build_url(addr))
        .header("apiKey", "wrong-key")
        .json(&plan())
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    handle.abort();
    let _ = handle.await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn builds_decision_steps() -> Result<()> {
    let _key = ApiKeyGuard::set("valid-key");
    let (addr, handle) = spawn_server(1024 * 1024).await?;
    let client = reqwest::Client::new();

    let resp = client
        .post(build_url(addr))
        .header("apiKey", "valid-key")
        .json(&plan())
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    let steps = body.as_array().expect("array response");
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[2]["type"], "decision");
    assert_eq!(steps[2]["content"], "Approval");
    assert_eq!(steps[2]["group"], "setup");
    assert_eq!(steps[2]["yes_step"], 4);
    assert_eq!(steps[2]["no_step"], 1);
    assert_eq!(steps[3]["content"], "deploy");

    handle.abort();
    let _ = handle.await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn validation_errors_use_the_envelope() -> Result<()> {
    let _key = ApiKeyGuard::set("valid-key");
    let (addr, handle) = spawn_server(1024 * 1024).await?;
    let client = reqwest::Client::new();

    let resp = client
        .post(build_url(addr))
        .header("apiKey", "valid-key")
        .json(&json!([{"order": 1, "content": "no group"}]))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "STEP-FIELD-001");
    assert_eq!(body["error"]["category"], "ValidationError");
    assert_eq!(
        body["error"]["message"],
        "Step at index 0 is missing required key: 'group'"
    );
    assert_eq!(body["error"]["context"]["field"], "group");
    assert_eq!(
        body["error"]["trace"][0],
        "Step at index 0 is missing required key: 'group'"
    );

    let resp = client
        .post(build_url(addr))
        .header("apiKey", "valid-key")
        .json(&json!([]))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"]["message"], "Steps cannot be empty.");

    let resp = client
        .post(build_url(addr))
        .header("apiKey", "valid-key")
        .json(&json!({"steps": []}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    handle.abort();
    let _ = handle.await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn unresolved_branch_is_unprocessable() -> Result<()> {
    let _key = ApiKeyGuard::set("valid-key");
    let (addr, handle) = spawn_server(1024 * 1024).await?;
    let client = reqwest::Client::new();

    // The last step is a question, so its yes branch points past the end.
    let resp = client
        .post(build_url(addr))
        .header("apiKey", "valid-key")
        .json(&json!([
            {"order": 1, "group": "g", "content": "draft"},
            {"order": 2, "group": "g", "content": "publish?"}
        ]))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "DECISION-REF-001");
    assert_eq!(body["error"]["context"]["branch"], "yes_step");

    handle.abort();
    let _ = handle.await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn enforces_body_limit() -> Result<()> {
    let _key = ApiKeyGuard::set("valid-key");
    let (addr, handle) = spawn_server(64).await?;
    let client = reqwest::Client::new();
    let payload = json!([{"order": 1, "group": "g", "content": "a".repeat(512)}]);

    let resp = client
        .post(build_url(addr))
        .header("apiKey", "valid-key")
        .json(&payload)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "WAVELINE-413");

    handle.abort();
    let _ = handle.await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn health_check_needs_no_key() -> Result<()> {
    let _key = ApiKeyGuard::set("valid-key");
    let (addr, handle) = spawn_server(1024).await?;

    let resp = reqwest::get(format!("http://{}/healthz", addr)).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], waveline::VERSION);

    handle.abort();
    let _ = handle.await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn refuses_to_start_without_api_key() {
    env::remove_var(KEY_ENV);
    let result = spawn_server(1024).await;
    assert!(result.is_err());
}
