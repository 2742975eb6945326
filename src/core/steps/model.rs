use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Marker carried in the `type` field of inserted steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Decision,
}

/// A unit of work in an ordered project plan.
///
/// Original steps carry `order`, `group` and `content`; anything else the caller sent, `type`
/// and branch keys included, is kept in `extra` and written back out untouched. Only decision
/// steps synthesized by the pipeline set `kind`, `yes_step` and `no_step`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub order: i64,
    pub group: String,
    pub content: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<StepKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_step: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_step: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Step {
    pub fn new<G: Into<String>, C: Into<String>>(order: i64, group: G, content: C) -> Self {
        Step {
            order,
            group: group.into(),
            content: content.into(),
            kind: None,
            yes_step: None,
            no_step: None,
            extra: Map::new(),
        }
    }

    /// Build the synthetic step for an enriched decision record.
    pub fn decision(record: &DecisionRecord, title: String, group: String) -> Self {
        Step {
            order: record.order,
            group,
            content: title,
            kind: Some(StepKind::Decision),
            yes_step: record.yes_step,
            no_step: record.no_step,
            extra: Map::new(),
        }
    }

    pub fn is_decision(&self) -> bool {
        self.kind == Some(StepKind::Decision)
    }

    pub fn target(&self, branch: Branch) -> Option<i64> {
        match branch {
            Branch::Yes => self.yes_step,
            Branch::No => self.no_step,
        }
    }

    pub fn set_target(&mut self, branch: Branch, target: Option<i64>) {
        match branch {
            Branch::Yes => self.yes_step = target,
            Branch::No => self.no_step = target,
        }
    }
}

/// The `(order, content)` view of a step handed to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepProjection {
    pub order: i64,
    pub content: String,
}

/// Project every step to the pair the classifier reasons over.
pub fn project_steps(steps: &[Step]) -> Vec<StepProjection> {
    steps
        .iter()
        .map(|step| StepProjection {
            order: step.order,
            content: step.content.clone(),
        })
        .collect()
}

/// One decision point as reported by the classifier, in original numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub order: i64,
    #[serde(default)]
    pub yes_step: Option<i64>,
    #[serde(default)]
    pub no_step: Option<i64>,
}

impl DecisionRecord {
    pub fn new(order: i64, yes_step: i64, no_step: i64) -> Self {
        DecisionRecord {
            order,
            yes_step: Some(yes_step),
            no_step: Some(no_step),
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = (Branch, i64)> {
        [(Branch::Yes, self.yes_step), (Branch::No, self.no_step)]
            .into_iter()
            .filter_map(|(branch, target)| target.map(|t| (branch, t)))
    }
}

/// Which outcome of a decision a target belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Yes,
    No,
}

impl Branch {
    pub const ALL: [Branch; 2] = [Branch::Yes, Branch::No];

    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Yes => "yes_step",
            Branch::No => "no_step",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a reconciled step came from, in terms of the caller's input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSource {
    /// The input step at `index`.
    Original { index: usize },
    /// A decision inserted after the input step at `parent`.
    Decision { parent: usize },
}

/// Final position bookkeeping returned alongside the reconciled steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    pub original_order: i64,
    pub source: StepSource,
}
