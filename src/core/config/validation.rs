#![allow(clippy::result_large_err)]

use super::WavelineConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::net::SocketAddr;

pub struct ConfigValidator;

fn invalid(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::ConfigurationError, message).with_code("CONFIG-003")
}

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &WavelineConfig) -> Result<(), AppError> {
        let bind = config.server.bind.trim();
        if bind.is_empty() {
            return Err(invalid("server.bind cannot be empty"));
        }
        if bind.parse::<SocketAddr>().is_err() {
            return Err(invalid(format!(
                "server.bind '{}' is not a socket address",
                bind
            )));
        }

        if config.server.api_key_env.trim().is_empty() {
            return Err(invalid("server.api_key_env cannot be empty"));
        }

        if config.server.max_body_bytes == 0 {
            return Err(invalid("server.max_body_bytes must be positive"));
        }

        if config.provider.timeout_seconds == 0 {
            return Err(invalid("provider.timeout_seconds must be positive"));
        }

        if config.reconcile.enrich_concurrency == 0 {
            return Err(invalid("reconcile.enrich_concurrency must be at least 1"));
        }

        let endpoints = [
            (
                "provider.openai",
                &config.provider.openai.model,
                &config.provider.openai.base_url,
            ),
            (
                "provider.groq",
                &config.provider.groq.model,
                &config.provider.groq.base_url,
            ),
        ];
        for (section, model, base_url) in endpoints {
            if model.trim().is_empty() {
                return Err(invalid(format!("{}.model cannot be empty", section)));
            }
            if let Err(e) = url::Url::parse(base_url) {
                return Err(invalid(format!(
                    "{}.base_url '{}' is not a valid URL: {}",
                    section, base_url, e
                )));
            }
        }

        Ok(())
    }
}
