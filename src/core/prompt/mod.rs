use crate::core::steps::StepProjection;

/// Rules handed to the classifier verbatim.
pub const DECISION_RULES: [&str; 3] = [
    "yes_step and no_step must never point to the same step.",
    "yes_step and no_step must never point to the same decision step.",
    "At least one of yes_step or no_step must point to the next step.",
];

/// Suffix appended to prompts whose reply must parse as JSON.
pub const JSON_REMINDER: &str = " Remember your answer must be in valid JSON format";

const OUTPUT_FORMAT: &str = "Return only the decision steps in the following valid JSON format:
[
    {
        \"order\": step order number that requires a decision or approval,
        \"yes_step\": <step order if the decision is true>,
        \"no_step\": <step order if the decision is false>
    }
]";

/// Constructs the three collaborator prompts: decision detection, decision title, and group
/// classification.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the classifier prompt over the `(order, content)` projection.
    pub fn decision_steps(steps: &[StepProjection], rules: &[&str]) -> String {
        let listing = serde_json::to_string_pretty(steps).unwrap_or_else(|_| {
            steps
                .iter()
                .map(|step| format!("{}. {}", step.order, step.content))
                .collect::<Vec<_>>()
                .join("\n")
        });

        let mut prompt = String::from(
            "You are provided with an ordered list of steps required to accomplish a project.\n\n",
        );
        prompt.push_str("Your task:\n");
        prompt.push_str(
            "Read, analyze, and fully understand the steps and how they relate to one another.\n",
        );
        prompt.push_str(
            "Identify any step that involves decision-making or requires approval to continue.\n\n",
        );
        prompt.push_str("For each identified decision step, determine:\n");
        prompt.push_str("yes_step: the step order to follow if the decision is approved or true.\n");
        prompt.push_str(
            "no_step: the step order to follow if the decision is rejected or false.\n\n",
        );
        prompt.push_str("Output Format:\n");
        prompt.push_str(OUTPUT_FORMAT);
        prompt.push_str("\n\nImportant Rules:\n");
        for rule in rules {
            prompt.push_str(rule);
            prompt.push('\n');
        }
        prompt.push_str("\nYour response must be a valid JSON array with no extra text.\n\n");
        prompt.push_str("Steps:\n");
        prompt.push_str(&listing);
        prompt.push('\n');
        prompt
    }

    /// Build the prompt asking for a 1-2 word decision title.
    pub fn decision_title(task: &[String]) -> String {
        format!(
            "Generate a decision title of 1-2 words of below task.\n\
             Return only your answer without any further word\n\n\
             Task:\n{}\n",
            render_task(task)
        )
    }

    /// Build the prompt asking to place the task in one of `groups`.
    pub fn step_group(task: &[String], groups: &[String]) -> String {
        let candidates = groups
            .iter()
            .map(|group| format!("- {}", group))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Classify the following task into one of the given groups.\n\
             Respond with only the group name, no explanation or extra words.\n\n\
             Task:\n{}\n\n\
             Available Groups:\n{}\n",
            render_task(task),
            candidates
        )
    }
}

fn render_task(task: &[String]) -> String {
    task.iter()
        .map(|content| content.trim())
        .collect::<Vec<_>>()
        .join("\n")
}
