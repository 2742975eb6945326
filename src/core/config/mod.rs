use crate::core::steps::{
    DuplicateDecisionPolicy, ReconcileOptions, ScreeningRules, UnresolvedTargetPolicy,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Main Waveline configuration loaded from waveline.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WavelineConfig {
    /// HTTP service configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Reconciliation policy configuration
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// HTTP service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Environment variable holding the shared API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Which completion backend serves collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    OpenAi,
    Groq,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::OpenAi => write!(f, "openai"),
            BackendKind::Groq => write!(f, "groq"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "groq" => Ok(BackendKind::Groq),
            _ => Err(format!(
                "invalid provider.backend '{}'; supported values are openai, groq",
                value
            )),
        }
    }
}

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend used for every collaborator call
    #[serde(default)]
    pub backend: BackendKind,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub groq: GroqConfig,
}

/// OpenAI Responses API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
}

/// Groq chat-completions settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    #[serde(default = "default_groq_model")]
    pub model: String,

    #[serde(default = "default_groq_base_url")]
    pub base_url: String,

    #[serde(default = "default_groq_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_groq_temperature")]
    pub temperature: f64,

    #[serde(default = "default_groq_max_completion_tokens")]
    pub max_completion_tokens: u32,

    #[serde(default = "default_groq_top_p")]
    pub top_p: f64,
}

/// Reconciliation policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Handling of repeated decision orders from the classifier
    #[serde(default)]
    pub duplicate_decisions: DuplicateDecisionPolicy,

    /// Handling of branch targets that match no input order
    #[serde(default)]
    pub unresolved_targets: UnresolvedTargetPolicy,

    /// Reject classifier records with self-referencing or identical branches
    #[serde(default = "default_validate_branches")]
    pub validate_branches: bool,

    /// Decisions enriched concurrently
    #[serde(default = "default_enrich_concurrency")]
    pub enrich_concurrency: usize,
}

impl ReconcileConfig {
    pub fn screening_rules(&self) -> ScreeningRules {
        ScreeningRules {
            duplicate_decisions: self.duplicate_decisions,
            unresolved_targets: self.unresolved_targets,
            validate_branches: self.validate_branches,
        }
    }

    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            duplicate_decisions: self.duplicate_decisions,
            unresolved_targets: self.unresolved_targets,
        }
    }
}

// Default functions
fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_api_key_env() -> String {
    "WAVELINE_API_KEY".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_openai_model() -> String {
    "gpt-4.1".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_groq_model() -> String {
    "meta-llama/llama-4-maverick-17b-128e-instruct".to_string()
}

fn default_groq_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_groq_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_groq_temperature() -> f64 {
    0.3
}

fn default_groq_max_completion_tokens() -> u32 {
    2000
}

fn default_groq_top_p() -> f64 {
    1.0
}

fn default_validate_branches() -> bool {
    true
}

fn default_enrich_concurrency() -> usize {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
            api_key_env: default_api_key_env(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            backend: BackendKind::default(),
            timeout_seconds: default_timeout_seconds(),
            openai: OpenAiConfig::default(),
            groq: GroqConfig::default(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        OpenAiConfig {
            model: default_openai_model(),
            base_url: default_openai_base_url(),
            api_key_env: default_openai_api_key_env(),
        }
    }
}

impl Default for GroqConfig {
    fn default() -> Self {
        GroqConfig {
            model: default_groq_model(),
            base_url: default_groq_base_url(),
            api_key_env: default_groq_api_key_env(),
            temperature: default_groq_temperature(),
            max_completion_tokens: default_groq_max_completion_tokens(),
            top_p: default_groq_top_p(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            duplicate_decisions: DuplicateDecisionPolicy::default(),
            unresolved_targets: UnresolvedTargetPolicy::default(),
            validate_branches: default_validate_branches(),
            enrich_concurrency: default_enrich_concurrency(),
        }
    }
}


pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;
