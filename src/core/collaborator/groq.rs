use super::{http_client, CollaboratorError, CompletionBackend, ResponseFormat};
use crate::core::config::GroqConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Groq chat-completions client (OpenAI-compatible wire format).
pub struct GroqBackend {
    config: GroqConfig,
    api_key: String,
    client: reqwest::Client,
}

impl GroqBackend {
    pub fn new(
        config: GroqConfig,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        Ok(GroqBackend {
            config,
            api_key,
            client: http_client(timeout)?,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[async_trait]
impl CompletionBackend for GroqBackend {
    fn provider_name(&self) -> &'static str {
        "groq"
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
            "messages": [
                {"role": "user", "content": &*prompt}
            ],
            "temperature": self.config.temperature,
            "max_completion_tokens": self.config.max_completion_tokens,
            "top_p": self.config.top_p,
            "stream": false,
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

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| CollaboratorError::DeserializationError(e.to_string()))?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(CollaboratorError::EmptyResponse {
                provider: self.provider_name(),
            })
    }
}
