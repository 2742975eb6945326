use super::{http_client, CollaboratorError, CompletionBackend, ResponseFormat};
use crate::core::config::OpenAiConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// OpenAI Responses API client.
pub struct OpenAiBackend {
    config: OpenAiConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(
        config: OpenAiConfig,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        Ok(OpenAiBackend {
            config,
            api_key,
            client: http_client(timeout)?,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text.filter(|t| !t.is_empty()) {
            return Some(text);
        }
        let joined: String = self
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        prompt: &str,
        format: ResponseFormat,
    ) -> Result<String, CollaboratorError> {
        let prompt = format.prompt(prompt);
        let payload = serde_json::json!({
            "model": &self.config.model,
            "input": &*prompt,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CollaboratorError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ResponsesReply = response
            .json()
            .await
            .map_err(|e| CollaboratorError::DeserializationError(e.to_string()))?;
        reply.into_text().ok_or(CollaboratorError::EmptyResponse {
            provider: self.provider_name(),
        })
    }
}
