use super::model::{DecisionRecord, Step};
use super::reconcile::{DuplicateDecisionPolicy, UnresolvedTargetPolicy};
use crate::core::error::StepError;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::warn;

/// Knobs applied to classifier output before any enrichment call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreeningRules {
    pub duplicate_decisions: DuplicateDecisionPolicy,
    pub unresolved_targets: UnresolvedTargetPolicy,
    pub validate_branches: bool,
}

impl Default for ScreeningRules {
    fn default() -> Self {
        ScreeningRules {
            duplicate_decisions: DuplicateDecisionPolicy::default(),
            unresolved_targets: UnresolvedTargetPolicy::default(),
            validate_branches: true,
        }
    }
}

/// Check classifier records against the input steps.
///
/// Returns the records that should be enriched, in classifier order with duplicates collapsed
/// according to the duplicate policy.
pub fn screen_decisions(
    steps: &[Step],
    decisions: Vec<DecisionRecord>,
    rules: &ScreeningRules,
) -> Result<Vec<DecisionRecord>, StepError> {
    let known: HashSet<i64> = steps.iter().map(|step| step.order).collect();

    let mut unique: IndexMap<i64, DecisionRecord> = IndexMap::with_capacity(decisions.len());
    for record in decisions {
        if unique.insert(record.order, record).is_some() {
            match rules.duplicate_decisions {
                DuplicateDecisionPolicy::Reject => {
                    return Err(StepError::DuplicateDecision {
                        order: record.order,
                    });
                }
                DuplicateDecisionPolicy::LastWins => {
                    warn!(order = record.order, "duplicate decision order; keeping the last record");
                }
            }
        }
    }

    let mut screened = Vec::with_capacity(unique.len());
    for record in unique.into_values() {
        if !known.contains(&record.order) {
            if rules.validate_branches {
                return Err(StepError::UnknownDecisionOrder {
                    order: record.order,
                });
            }
            warn!(order = record.order, "decision matches no input step; skipped");
            continue;
        }
        if rules.validate_branches {
            check_branches(&record)?;
        }
        if rules.unresolved_targets == UnresolvedTargetPolicy::Reject {
            if let Some((branch, target)) = record
                .targets()
                .find(|(_, target)| !known.contains(target))
            {
                return Err(StepError::UnresolvedTarget {
                    decision_order: record.order,
                    branch,
                    target,
                });
            }
        }
        screened.push(record);
    }
    Ok(screened)
}

fn check_branches(record: &DecisionRecord) -> Result<(), StepError> {
    if let (Some(yes), Some(no)) = (record.yes_step, record.no_step) {
        if yes == no {
            return Err(StepError::InvalidBranch {
                order: record.order,
                reason: format!("yes_step and no_step both point to step {}", yes),
            });
        }
    }
    if let Some((branch, _)) = record
        .targets()
        .find(|(_, target)| *target == record.order)
    {
        return Err(StepError::InvalidBranch {
            order: record.order,
            reason: format!("{} points back to the decision itself", branch),
        });
    }
    Ok(())
}
