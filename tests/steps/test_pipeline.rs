use async_trait::async_trait;
use insta::assert_json_snapshot;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use waveline::core::collaborator::{CollaboratorError, DecisionCollaborator};
use waveline::core::config::ReconcileConfig;
use waveline::core::error::StepError;
use waveline::core::pipeline::DecisionPipeline;
use waveline::core::steps::{DecisionRecord, StepProjection, StepSource};

/// Collaborator returning fixed records, titling decisions from their task text.
#[derive(Default)]
struct ScriptedCollaborator {
    records: Vec<DecisionRecord>,
    group: String,
    fail_classify: bool,
    classify_calls: AtomicUsize,
    enrich_calls: AtomicUsize,
    seen_rules: Mutex<Vec<String>>,
    seen_groups: Mutex<Vec<String>>,
}

impl ScriptedCollaborator {
    fn new(records: Vec<DecisionRecord>, group: &str) -> Self {
        ScriptedCollaborator {
            records,
            group: group.to_string(),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst) + self.enrich_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionCollaborator for ScriptedCollaborator {
    async fn classify(
        &self,
        _steps: &[StepProjection],
        rules: &[&str],
    ) -> Result<Vec<DecisionRecord>, StepError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_rules.lock().unwrap() = rules.iter().map(|rule| rule.to_string()).collect();
        if self.fail_classify {
            return Err(CollaboratorError::ServerError {
                status: 503,
                body: "overloaded".into(),
            }
            .into());
        }
        Ok(self.records.clone())
    }

    async fn title(&self, task: &[String]) -> Result<String, StepError> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);
        Ok(if task.iter().any(|t| t.contains("release")) {
            "Release Approval".to_string()
        } else {
            format!("Check {}", task.join(" / "))
        })
    }

    async fn group(&self, _task: &[String], groups: &[String]) -> Result<String, StepError> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_groups.lock().unwrap() = groups.to_vec();
        Ok(self.group.clone())
    }
}

fn worked_example() -> Vec<Value> {
    vec![
        json!({"order": 1, "group": "setup", "content": "install deps"}),
        json!({"order": 2, "group": "build", "content": "approve release?"}),
        json!({"order": 3, "group": "ship", "content": "deploy"}),
    ]
}

fn pipeline(collaborator: Arc<ScriptedCollaborator>, config: &ReconcileConfig) -> DecisionPipeline {
    DecisionPipeline::new(collaborator, config)
}

#[tokio::test]
async fn worked_example_produces_renumbered_sequence() {
    let collaborator = Arc::new(ScriptedCollaborator::new(
        vec![DecisionRecord::new(2, 3, 1)],
        "build",
    ));
    let pipeline = pipeline(collaborator.clone(), &ReconcileConfig::default());

    let reconciled = pipeline.run(&worked_example()).await.unwrap();

    assert_json_snapshot!(reconciled.steps, @r###"
    [
      {
        "order": 1,
        "group": "setup",
        "content": "install deps"
      },
      {
        "order": 2,
        "group": "build",
        "content": "approve release?"
      },
      {
        "order": 3,
        "group": "build",
        "content": "Release Approval",
        "type": "decision",
        "yes_step": 4,
        "no_step": 1
      },
      {
        "order": 4,
        "group": "ship",
        "content": "deploy"
      }
    ]
    "###);
    assert_eq!(
        reconciled.provenance[2].source,
        StepSource::Decision { parent: 1 }
    );
    assert_eq!(collaborator.classify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(collaborator.enrich_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *collaborator.seen_groups.lock().unwrap(),
        vec!["setup", "build", "ship"]
    );
    assert_eq!(collaborator.seen_rules.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn empty_input_makes_no_collaborator_calls() {
    let collaborator = Arc::new(ScriptedCollaborator::new(Vec::new(), "build"));
    let pipeline = pipeline(collaborator.clone(), &ReconcileConfig::default());

    let err = pipeline.run(&[]).await.unwrap_err();

    assert!(matches!(err, StepError::EmptyInput));
    assert_eq!(err.to_string(), "Steps cannot be empty.");
    assert_eq!(collaborator.calls(), 0);
}

#[tokio::test]
async fn invalid_step_makes_no_collaborator_calls() {
    let collaborator = Arc::new(ScriptedCollaborator::new(Vec::new(), "build"));
    let pipeline = pipeline(collaborator.clone(), &ReconcileConfig::default());
    let raw = vec![json!({"order": 1, "content": "no group here"})];

    let err = pipeline.run(&raw).await.unwrap_err();

    assert!(matches!(err, StepError::MissingField { index: 0, .. }));
    assert_eq!(collaborator.calls(), 0);
}

#[tokio::test]
async fn classifier_failure_propagates_without_enrichment() {
    let collaborator = Arc::new(ScriptedCollaborator {
        fail_classify: true,
        ..Default::default()
    });
    let pipeline = pipeline(collaborator.clone(), &ReconcileConfig::default());

    let err = pipeline.run(&worked_example()).await.unwrap_err();

    assert!(matches!(
        err,
        StepError::Collaborator(CollaboratorError::ServerError { status: 503, .. })
    ));
    assert_eq!(collaborator.enrich_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn screening_failure_skips_enrichment() {
    let collaborator = Arc::new(ScriptedCollaborator::new(
        vec![DecisionRecord::new(2, 3, 1), DecisionRecord::new(2, 1, 3)],
        "build",
    ));
    let pipeline = pipeline(collaborator.clone(), &ReconcileConfig::default());

    let err = pipeline.run(&worked_example()).await.unwrap_err();

    assert!(matches!(err, StepError::DuplicateDecision { order: 2 }));
    assert_eq!(collaborator.enrich_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_enrichment_keeps_classifier_order() {
    let raw: Vec<Value> = (1..=6)
        .map(|order| json!({"order": order, "group": "g", "content": format!("step {}", order)}))
        .collect();
    let records = vec![
        DecisionRecord::new(5, 6, 1),
        DecisionRecord::new(2, 3, 1),
        DecisionRecord::new(4, 5, 3),
    ];
    let collaborator = Arc::new(ScriptedCollaborator::new(records, "g"));
    let config = ReconcileConfig {
        enrich_concurrency: 3,
        ..Default::default()
    };

    let reconciled = pipeline(collaborator.clone(), &config)
        .run(&raw)
        .await
        .unwrap();

    let decisions: Vec<(i64, &str)> = reconciled
        .steps
        .iter()
        .filter(|step| step.is_decision())
        .map(|step| (step.order, step.content.as_str()))
        .collect();
    assert_eq!(
        decisions,
        vec![(3, "Check step 2"), (6, "Check step 4"), (8, "Check step 5")]
    );
    assert_eq!(reconciled.steps.len(), 9);
    assert_eq!(collaborator.enrich_calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn duplicated_parent_orders_share_one_task() {
    let raw = vec![
        json!({"order": 1, "group": "g", "content": "plan"}),
        json!({"order": 2, "group": "g", "content": "review"}),
        json!({"order": 2, "group": "g", "content": "sign off?"}),
        json!({"order": 3, "group": "g", "content": "ship"}),
    ];
    let collaborator = Arc::new(ScriptedCollaborator::new(
        vec![DecisionRecord::new(2, 3, 1)],
        "g",
    ));

    let reconciled = pipeline(collaborator, &ReconcileConfig::default())
        .run(&raw)
        .await
        .unwrap();

    assert_eq!(reconciled.steps.len(), 5);
    let decision = &reconciled.steps[3];
    assert!(decision.is_decision());
    assert_eq!(decision.content, "Check review / sign off?");
    assert_eq!(decision.yes_step, Some(5));
    assert_eq!(decision.no_step, Some(1));
}

#[tokio::test]
async fn caller_type_and_branch_keys_pass_through_untouched() {
    let raw = vec![
        json!({"order": 1, "group": "setup", "content": "install deps", "type": "task"}),
        json!({"order": 2, "group": "build", "content": "approve release?", "type": "task", "yes_step": "maybe"}),
        json!({"order": 3, "group": "ship", "content": "deploy", "type": "decision", "yes_step": 1, "no_step": 2}),
    ];
    let collaborator = Arc::new(ScriptedCollaborator::new(
        vec![DecisionRecord::new(2, 3, 1)],
        "build",
    ));

    let reconciled = pipeline(collaborator.clone(), &ReconcileConfig::default())
        .run(&raw)
        .await
        .unwrap();

    let output = serde_json::to_value(&reconciled.steps).unwrap();
    assert_eq!(output.as_array().map(Vec::len), Some(4));
    assert_eq!(output[0]["type"], "task");
    assert_eq!(output[1]["yes_step"], "maybe");
    assert_eq!(output[2]["type"], "decision");
    assert_eq!(output[2]["yes_step"], 4);
    // An input step tagged as a decision is still an original step; its keys are not rewritten.
    assert_eq!(output[3]["order"], 4);
    assert_eq!(output[3]["type"], "decision");
    assert_eq!(output[3]["yes_step"], 1);
    assert_eq!(output[3]["no_step"], 2);
    assert_eq!(
        reconciled.provenance[3].source,
        StepSource::Original { index: 2 }
    );
    assert_eq!(collaborator.calls(), 3);
}
