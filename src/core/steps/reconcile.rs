//! Interleaving of decision steps and the final renumbering pass.
//!
//! Reconciliation runs in two stages. [`merge_decisions`] walks the input list and slots each
//! decision in right after the step it annotates. [`renumber`] then assigns contiguous orders
//! `1..N` by a stable sort on the original order and rewrites every `yes_step`/`no_step` from
//! original numbering into final numbering.

use super::model::{Branch, Provenance, Step, StepSource};
use crate::core::error::StepError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::{debug, warn};

/// What to do when the classifier reports two decisions for the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDecisionPolicy {
    #[default]
    Reject,
    /// Keep the record reported last and discard earlier ones.
    LastWins,
}

/// What to do with a branch target that matches no input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedTargetPolicy {
    #[default]
    Reject,
    /// Remove the branch field from the decision step.
    Drop,
}

impl FromStr for DuplicateDecisionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "reject" => Ok(DuplicateDecisionPolicy::Reject),
            "last_wins" => Ok(DuplicateDecisionPolicy::LastWins),
            other => Err(format!("unknown duplicate decision policy '{}'", other)),
        }
    }
}

impl FromStr for UnresolvedTargetPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "reject" => Ok(UnresolvedTargetPolicy::Reject),
            "drop" => Ok(UnresolvedTargetPolicy::Drop),
            other => Err(format!("unknown unresolved target policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOptions {
    pub duplicate_decisions: DuplicateDecisionPolicy,
    pub unresolved_targets: UnresolvedTargetPolicy,
}

/// A step in the interleaved sequence together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedStep {
    pub step: Step,
    pub source: StepSource,
}

/// Output of [`merge_decisions`]: original numbering, decisions interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSequence {
    pub items: Vec<MergedStep>,
    /// Position in `items` of each input step, indexed by input position.
    pub original_positions: Vec<usize>,
}

impl MergedSequence {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Final sequence plus a provenance entry for every final position.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub steps: Vec<Step>,
    pub provenance: Vec<Provenance>,
}

impl Reconciled {
    /// Input indices of the original steps, listed in final order.
    pub fn original_indices(&self) -> Vec<usize> {
        self.provenance
            .iter()
            .filter_map(|entry| match entry.source {
                StepSource::Original { index } => Some(index),
                StepSource::Decision { .. } => None,
            })
            .collect()
    }
}

/// Merge and renumber in one call.
pub fn reconcile(
    original: &[Step],
    decisions: Vec<Step>,
    options: ReconcileOptions,
) -> Result<Reconciled, StepError> {
    let merged = merge_decisions(original, decisions, options.duplicate_decisions)?;
    renumber(original, merged, options.unresolved_targets)
}

/// Interleave decision steps into the original sequence.
///
/// A decision is placed directly after the last input step sharing its order, so it sorts
/// behind every parent during renumbering. Decisions whose order matches no input step are
/// dropped.
pub fn merge_decisions(
    original: &[Step],
    decisions: Vec<Step>,
    policy: DuplicateDecisionPolicy,
) -> Result<MergedSequence, StepError> {
    let mut by_order: BTreeMap<i64, Step> = BTreeMap::new();
    for decision in decisions {
        let order = decision.order;
        if by_order.insert(order, decision).is_some() {
            match policy {
                DuplicateDecisionPolicy::Reject => {
                    return Err(StepError::DuplicateDecision { order });
                }
                DuplicateDecisionPolicy::LastWins => {
                    warn!(order, "duplicate decision order; keeping the last record");
                }
            }
        }
    }

    let mut last_index: HashMap<i64, usize> = HashMap::with_capacity(original.len());
    for (index, step) in original.iter().enumerate() {
        last_index.insert(step.order, index);
    }

    let mut items = Vec::with_capacity(original.len() + by_order.len());
    let mut original_positions = Vec::with_capacity(original.len());
    for (index, step) in original.iter().enumerate() {
        original_positions.push(items.len());
        items.push(MergedStep {
            step: step.clone(),
            source: StepSource::Original { index },
        });
        if last_index.get(&step.order) == Some(&index) {
            if let Some(decision) = by_order.remove(&step.order) {
                items.push(MergedStep {
                    step: decision,
                    source: StepSource::Decision { parent: index },
                });
            }
        }
    }

    for order in by_order.keys() {
        warn!(order, "decision matches no input step; dropped");
    }

    debug!(
        original = original.len(),
        merged = items.len(),
        "decisions merged"
    );
    Ok(MergedSequence {
        items,
        original_positions,
    })
}

/// Assign final orders `1..N` and rewrite branch targets into the final numbering.
///
/// Items are ranked by original order; ties keep their merged position, so duplicated orders
/// are renumbered first in, first out. Branch targets are resolved against `original` (first
/// input step with the target order) and then mapped through the rank table.
pub fn renumber(
    original: &[Step],
    merged: MergedSequence,
    policy: UnresolvedTargetPolicy,
) -> Result<Reconciled, StepError> {
    let MergedSequence {
        items,
        original_positions,
    } = merged;

    let mut ranked: Vec<(usize, MergedStep)> = items.into_iter().enumerate().collect();
    ranked.sort_by_key(|(_, item)| item.step.order);

    let mut final_order = vec![0i64; ranked.len()];
    for (rank, (position, _)) in ranked.iter().enumerate() {
        final_order[*position] = rank as i64 + 1;
    }

    let mut first_index: HashMap<i64, usize> = HashMap::with_capacity(original.len());
    for (index, step) in original.iter().enumerate() {
        first_index.entry(step.order).or_insert(index);
    }
    let resolve = |target: i64| -> Option<i64> {
        first_index
            .get(&target)
            .map(|index| final_order[original_positions[*index]])
    };

    let mut steps = Vec::with_capacity(ranked.len());
    let mut provenance = Vec::with_capacity(ranked.len());
    for (rank, (_, item)) in ranked.into_iter().enumerate() {
        let MergedStep { mut step, source } = item;
        let original_order = step.order;
        step.order = rank as i64 + 1;

        if let StepSource::Decision { .. } = source {
            for branch in Branch::ALL {
                let Some(target) = step.target(branch) else {
                    continue;
                };
                match resolve(target) {
                    Some(resolved) => step.set_target(branch, Some(resolved)),
                    None => match policy {
                        UnresolvedTargetPolicy::Reject => {
                            return Err(StepError::UnresolvedTarget {
                                decision_order: original_order,
                                branch,
                                target,
                            });
                        }
                        UnresolvedTargetPolicy::Drop => {
                            warn!(
                                order = original_order,
                                %branch,
                                target,
                                "branch target matches no input step; dropped"
                            );
                            step.set_target(branch, None);
                        }
                    },
                }
            }
        }

        provenance.push(Provenance {
            original_order,
            source,
        });
        steps.push(step);
    }

    Ok(Reconciled { steps, provenance })
}
