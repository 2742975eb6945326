use super::{CompletionBackend, DecisionCollaborator, ResponseFormat};
use crate::core::error::StepError;
use crate::core::prompt::PromptBuilder;
use crate::core::steps::{DecisionRecord, StepProjection};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

static CODE_FENCE: OnceLock<Regex> = OnceLock::new();

/// Adapts a raw completion backend to the decision capability used by the pipeline.
#[derive(Clone)]
pub struct LlmCollaborator {
    backend: Arc<dyn CompletionBackend>,
}

impl LlmCollaborator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        LlmCollaborator { backend }
    }

    async fn complete_text(&self, prompt: &str) -> Result<String, StepError> {
        let reply = self.backend.complete(prompt, ResponseFormat::Text).await?;
        let text = reply.trim();
        if text.is_empty() {
            return Err(StepError::format("expected a non-empty text reply", reply));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl DecisionCollaborator for LlmCollaborator {
    async fn classify(
        &self,
        steps: &[StepProjection],
        rules: &[&str],
    ) -> Result<Vec<DecisionRecord>, StepError> {
        let prompt = PromptBuilder::decision_steps(steps, rules);
        let reply = self.backend.complete(&prompt, ResponseFormat::Json).await?;
        let records = parse_decision_records(&reply)?;
        debug!(
            provider = self.backend.provider_name(),
            decisions = records.len(),
            "classifier replied"
        );
        Ok(records)
    }

    async fn title(&self, task: &[String]) -> Result<String, StepError> {
        self.complete_text(&PromptBuilder::decision_title(task)).await
    }

    async fn group(&self, task: &[String], groups: &[String]) -> Result<String, StepError> {
        let group = self
            .complete_text(&PromptBuilder::step_group(task, groups))
            .await?;
        if !groups.iter().any(|candidate| candidate == &group) {
            warn!(group = %group, "group reply is not one of the input groups");
        }
        Ok(group)
    }
}

/// Remove Markdown code fence markers (with an optional language tag) from a reply.
pub fn strip_code_fences(raw: &str) -> String {
    let fence = CODE_FENCE
        .get_or_init(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("code fence pattern compiles"));
    fence.replace_all(raw, "").trim().to_string()
}

/// Parse the classifier reply into decision records.
///
/// The reply must be a JSON array of objects, each with an integer `order`; `yes_step` and
/// `no_step` may be integers, `null`, or absent.
pub fn parse_decision_records(raw: &str) -> Result<Vec<DecisionRecord>, StepError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| StepError::format(format!("reply is not valid JSON: {}", e), raw))?;
    let entries = value
        .as_array()
        .ok_or_else(|| StepError::format("expected a JSON array of decisions", raw))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.get("order").is_none() {
                return Err(StepError::format(
                    format!("decision {} is missing 'order'", index),
                    raw,
                ));
            }
            serde_json::from_value::<DecisionRecord>(entry.clone()).map_err(|e| {
                StepError::format(format!("decision {} is malformed: {}", index, e), raw)
            })
        })
        .collect()
}
