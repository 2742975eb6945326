pub mod collaborator;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod steps;
pub mod types;

pub use collaborator::{CompletionBackend, DecisionCollaborator, LlmCollaborator};
pub use config::{ConfigLoader, ConfigValidator, WavelineConfig};
pub use error::{AppError, DefaultErrorReporter, ErrorReporter, StepError};
pub use pipeline::DecisionPipeline;
pub use types::*;
