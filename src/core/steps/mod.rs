pub mod model;
pub mod reconcile;
pub mod screen;
pub mod validate;

pub use model::{
    project_steps, Branch, DecisionRecord, Provenance, Step, StepKind, StepProjection, StepSource,
};
pub use reconcile::{
    merge_decisions, reconcile, renumber, DuplicateDecisionPolicy, MergedSequence, MergedStep,
    ReconcileOptions, Reconciled, UnresolvedTargetPolicy,
};
pub use screen::{screen_decisions, ScreeningRules};
pub use validate::{validate_steps, REQUIRED_FIELDS};
