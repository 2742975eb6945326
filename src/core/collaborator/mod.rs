//! Seams to the text-completion services the pipeline consults.
//!
//! [`DecisionCollaborator`] is the narrow capability the engine depends on: classify decision
//! points, title a decision, and place it in a group. [`CompletionBackend`] is the lower-level
//! "prompt in, text out" call that [`LlmCollaborator`] turns into that capability. Backends are
//! chosen by configuration through [`build_backend`].

pub mod groq;
pub mod llm;
pub mod openai;

pub use groq::GroqBackend;
pub use llm::{parse_decision_records, strip_code_fences, LlmCollaborator};
pub use openai::OpenAiBackend;

use crate::core::config::{BackendKind, ProviderConfig};
use crate::core::error::StepError;
use crate::core::prompt::JSON_REMINDER;
use crate::core::steps::{DecisionRecord, StepProjection};
use async_trait::async_trait;
use std::borrow::Cow;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Shape the caller expects back from a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

impl ResponseFormat {
    /// The prompt as sent on the wire; JSON requests end with [`JSON_REMINDER`].
    pub fn prompt<'a>(self, prompt: &'a str) -> Cow<'a, str> {
        match self {
            ResponseFormat::Text => Cow::Borrowed(prompt),
            ResponseFormat::Json => Cow::Owned(format!("{}{}", prompt, JSON_REMINDER)),
        }
    }
}

/// Errors raised by completion backends before any reply parsing happens.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Server returned status {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("{provider} returned no completion text")]
    EmptyResponse { provider: &'static str },
    #[error("Missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),
}

/// A single prompt-to-text call against a language model provider.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider identifier used in logs.
    fn provider_name(&self) -> &'static str;

    /// Model identifier used in logs.
    fn model_name(&self) -> &str;

    async fn complete(
        &self,
        prompt: &str,
        format: ResponseFormat,
    ) -> Result<String, CollaboratorError>;
}

/// Everything the pipeline needs from the outside world.
#[async_trait]
pub trait DecisionCollaborator: Send + Sync {
    /// Identify decision points among `steps`, returning records in original numbering.
    async fn classify(
        &self,
        steps: &[StepProjection],
        rules: &[&str],
    ) -> Result<Vec<DecisionRecord>, StepError>;

    /// Produce a short title for the decision annotating `task`.
    async fn title(&self, task: &[String]) -> Result<String, StepError>;

    /// Pick the best-fitting group for `task` out of `groups`.
    async fn group(&self, task: &[String], groups: &[String]) -> Result<String, StepError>;
}

/// Instantiate the backend selected by `config.backend`.
pub fn build_backend(config: &ProviderConfig) -> Result<Arc<dyn CompletionBackend>, CollaboratorError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    let backend: Arc<dyn CompletionBackend> = match config.backend {
        BackendKind::OpenAi => {
            let api_key = read_api_key(&config.openai.api_key_env)?;
            Arc::new(OpenAiBackend::new(config.openai.clone(), api_key, timeout)?)
        }
        BackendKind::Groq => {
            let api_key = read_api_key(&config.groq.api_key_env)?;
            Arc::new(GroqBackend::new(config.groq.clone(), api_key, timeout)?)
        }
    };
    tracing::info!(
        provider = backend.provider_name(),
        model = backend.model_name(),
        "completion backend ready"
    );
    Ok(backend)
}

/// Convenience wrapper: backend selected by configuration, adapted to the pipeline contract.
pub fn build_collaborator(
    config: &ProviderConfig,
) -> Result<Arc<dyn DecisionCollaborator>, CollaboratorError> {
    let backend = build_backend(config)?;
    Ok(Arc::new(LlmCollaborator::new(backend)))
}

fn read_api_key(var: &str) -> Result<String, CollaboratorError> {
    env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| CollaboratorError::MissingCredentials(var.to_string()))
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CollaboratorError::NetworkError(e.to_string()))
}
