use super::model::Step;
use crate::core::error::StepError;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Keys every input step must carry, checked in this order.
pub const REQUIRED_FIELDS: [&str; 3] = ["order", "content", "group"];

/// Wire shape of a caller-supplied step. Only the required keys are typed; `type`,
/// `yes_step` and every other key stay opaque in `extra`.
#[derive(Deserialize)]
struct InputStep {
    order: i64,
    group: String,
    content: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<InputStep> for Step {
    fn from(input: InputStep) -> Self {
        Step {
            extra: input.extra,
            ..Step::new(input.order, input.group, input.content)
        }
    }
}

/// Check the raw request payload and decode it into typed steps.
///
/// The first violation in input order wins. Extra keys are left alone and travel with the step.
pub fn validate_steps(raw: &[Value]) -> Result<Vec<Step>, StepError> {
    if raw.is_empty() {
        return Err(StepError::EmptyInput);
    }

    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            let object = value
                .as_object()
                .ok_or(StepError::NotAnObject { index })?;
            if let Some(field) = REQUIRED_FIELDS
                .iter()
                .copied()
                .find(|field| !object.contains_key(*field))
            {
                return Err(StepError::MissingField { index, field });
            }
            serde_json::from_value::<InputStep>(value.clone())
                .map(Step::from)
                .map_err(|err| StepError::InvalidField {
                    index,
                    reason: err.to_string(),
                })
        })
        .collect()
}
