//! End-to-end decision pipeline: validate, classify, screen, enrich, reconcile.

use crate::core::collaborator::{build_collaborator, DecisionCollaborator};
use crate::core::config::{ReconcileConfig, WavelineConfig};
use crate::core::error::{AppError, StepError};
use crate::core::prompt::DECISION_RULES;
use crate::core::steps::{
    project_steps, reconcile, screen_decisions, validate_steps, DecisionRecord, ReconcileOptions,
    Reconciled, ScreeningRules, Step,
};
use crate::core::types::ErrorCategory;
use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexSet;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs one request's steps through the collaborator and the reconciler.
///
/// The pipeline holds no per-request state and is shared across requests behind an `Arc`.
#[derive(Clone)]
pub struct DecisionPipeline {
    collaborator: Arc<dyn DecisionCollaborator>,
    screening: ScreeningRules,
    options: ReconcileOptions,
    enrich_concurrency: usize,
}

impl DecisionPipeline {
    pub fn new(collaborator: Arc<dyn DecisionCollaborator>, config: &ReconcileConfig) -> Self {
        DecisionPipeline {
            collaborator,
            screening: config.screening_rules(),
            options: config.options(),
            enrich_concurrency: config.enrich_concurrency.max(1),
        }
    }

    /// Build the pipeline with the completion backend selected by `config.provider`.
    pub fn from_config(config: &WavelineConfig) -> Result<Self, AppError> {
        let collaborator = build_collaborator(&config.provider).map_err(|e| {
            AppError::new(ErrorCategory::ConfigurationError, e.to_string())
                .with_code("CONFIG-004")
                .with_context("backend", config.provider.backend.to_string())
        })?;
        Ok(Self::new(collaborator, &config.reconcile))
    }

    /// Validate `raw`, identify and enrich decisions, then merge and renumber.
    ///
    /// Fails without contacting the collaborator when validation fails.
    pub async fn run(&self, raw: &[Value]) -> Result<Reconciled, StepError> {
        let steps = validate_steps(raw)?;
        debug!(steps = steps.len(), "input validated");

        let projection = project_steps(&steps);
        let records = self
            .collaborator
            .classify(&projection, &DECISION_RULES)
            .await?;
        let classified = records.len();

        let records = screen_decisions(&steps, records, &self.screening)?;
        debug!(
            classified,
            screened = records.len(),
            "classifier output screened"
        );

        let decisions = self.enrich(&steps, records).await?;
        let reconciled = reconcile(&steps, decisions, self.options)?;

        info!(
            input_steps = steps.len(),
            output_steps = reconciled.steps.len(),
            decisions = reconciled.steps.len() - steps.len(),
            "decision steps built"
        );
        Ok(reconciled)
    }

    async fn enrich(
        &self,
        steps: &[Step],
        records: Vec<DecisionRecord>,
    ) -> Result<Vec<Step>, StepError> {
        let groups = distinct_groups(steps);
        let groups = &groups;
        let collaborator = self.collaborator.as_ref();

        stream::iter(records)
            .map(|record| async move {
                let task = task_for(steps, record.order);
                let (title, group) = futures::try_join!(
                    collaborator.title(&task),
                    collaborator.group(&task, groups)
                )?;
                debug!(order = record.order, title = %title, group = %group, "decision enriched");
                Ok::<_, StepError>(Step::decision(&record, title, group))
            })
            .buffered(self.enrich_concurrency)
            .try_collect()
            .await
    }
}

/// Distinct `group` values in first-seen order.
pub fn distinct_groups(steps: &[Step]) -> Vec<String> {
    steps
        .iter()
        .map(|step| step.group.clone())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Content of every input step sharing `order`, in input order.
fn task_for(steps: &[Step], order: i64) -> Vec<String> {
    steps
        .iter()
        .filter(|step| step.order == order)
        .map(|step| step.content.clone())
        .collect()
}
