#![allow(clippy::result_large_err)]

use super::{ConfigValidator, WavelineConfig};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up when no path is given.
pub const CONFIG_FILE_NAME: &str = "waveline.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from `path`, or from ./waveline.toml when no path is given.
    /// Environment variables override config file values, then the result is validated.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<WavelineConfig, AppError> {
        let config_file = match path {
            Some(path) => Some(Self::load_from_file(path)?.ok_or_else(|| {
                AppError::new(
                    ErrorCategory::ConfigurationError,
                    format!("Config file {} does not exist", path.display()),
                )
                .with_code("CONFIG-001")
            })?),
            None => Self::load_from_file(&PathBuf::from(CONFIG_FILE_NAME))?,
        };

        let mut config = config_file.unwrap_or_default();

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut config);

        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<WavelineConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: WavelineConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("CONFIG-002")
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    /// Environment variables take precedence over config file values
    pub fn apply_env_overrides(config: &mut WavelineConfig) {
        // Server overrides
        if let Ok(bind) = env::var("WAVELINE_SERVER_BIND") {
            config.server.bind = bind;
        }

        if let Ok(port_str) = env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                if let Ok(mut addr) = config.server.bind.parse::<SocketAddr>() {
                    addr.set_port(port);
                    config.server.bind = addr.to_string();
                }
            }
        }

        if let Ok(api_key_env) = env::var("WAVELINE_SERVER_API_KEY_ENV") {
            config.server.api_key_env = api_key_env;
        }

        if let Ok(max_body_str) = env::var("WAVELINE_SERVER_MAX_BODY_BYTES") {
            if let Ok(max_body_bytes) = max_body_str.parse::<usize>() {
                config.server.max_body_bytes = max_body_bytes;
            }
        }

        // Provider overrides
        if let Ok(backend_str) = env::var("WAVELINE_PROVIDER_BACKEND") {
            if let Ok(backend) = backend_str.parse() {
                config.provider.backend = backend;
            }
        }

        if let Ok(timeout_str) = env::var("WAVELINE_PROVIDER_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                config.provider.timeout_seconds = timeout;
            }
        }

        if let Ok(model) = env::var("WAVELINE_OPENAI_MODEL") {
            config.provider.openai.model = model;
        }

        if let Ok(base_url) = env::var("WAVELINE_OPENAI_BASE_URL") {
            config.provider.openai.base_url = base_url;
        }

        if let Ok(model) = env::var("WAVELINE_GROQ_MODEL") {
            config.provider.groq.model = model;
        }

        if let Ok(base_url) = env::var("WAVELINE_GROQ_BASE_URL") {
            config.provider.groq.base_url = base_url;
        }

        // Reconcile overrides
        if let Ok(policy_str) = env::var("WAVELINE_RECONCILE_DUPLICATE_DECISIONS") {
            if let Ok(policy) = policy_str.parse() {
                config.reconcile.duplicate_decisions = policy;
            }
        }

        if let Ok(policy_str) = env::var("WAVELINE_RECONCILE_UNRESOLVED_TARGETS") {
            if let Ok(policy) = policy_str.parse() {
                config.reconcile.unresolved_targets = policy;
            }
        }

        if let Ok(validate_str) = env::var("WAVELINE_RECONCILE_VALIDATE_BRANCHES") {
            if let Ok(validate) = validate_str.parse::<bool>() {
                config.reconcile.validate_branches = validate;
            }
        }

        if let Ok(concurrency_str) = env::var("WAVELINE_RECONCILE_ENRICH_CONCURRENCY") {
            if let Ok(concurrency) = concurrency_str.parse::<usize>() {
                config.reconcile.enrich_concurrency = concurrency;
            }
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "WAVELINE_SERVER_BIND - Override the listen address (default: 0.0.0.0:8000)",
            "PORT - Override only the listen port",
            "WAVELINE_SERVER_API_KEY_ENV - Name of the variable holding the request API key (default: WAVELINE_API_KEY)",
            "WAVELINE_SERVER_MAX_BODY_BYTES - Override the request body limit (default: 1048576)",
            "WAVELINE_PROVIDER_BACKEND - Completion backend (openai/groq, default: openai)",
            "WAVELINE_PROVIDER_TIMEOUT_SECONDS - Per-request provider timeout (default: 60)",
            "WAVELINE_OPENAI_MODEL - Override the OpenAI model (default: gpt-4.1)",
            "WAVELINE_OPENAI_BASE_URL - Override the OpenAI API base URL",
            "WAVELINE_GROQ_MODEL - Override the Groq model (default: meta-llama/llama-4-maverick-17b-128e-instruct)",
            "WAVELINE_GROQ_BASE_URL - Override the Groq API base URL",
            "WAVELINE_RECONCILE_DUPLICATE_DECISIONS - Duplicate decision policy (reject/last_wins, default: reject)",
            "WAVELINE_RECONCILE_UNRESOLVED_TARGETS - Unresolved target policy (reject/drop, default: reject)",
            "WAVELINE_RECONCILE_VALIDATE_BRANCHES - Screen classifier branches (true/false, default: true)",
            "WAVELINE_RECONCILE_ENRICH_CONCURRENCY - Decisions enriched concurrently (default: 1)",
            "OPENAI_API_KEY - OpenAI API key (variable name configurable)",
            "GROQ_API_KEY - Groq API key (variable name configurable)",
            "RUST_LOG - Override the log filter",
        ]
    }
}
