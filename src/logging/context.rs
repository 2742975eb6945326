use crate::cli::Command;

/// Execution contexts that influence how logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Long-running HTTP service; stdout is free for logs.
    Server,
    /// One-shot commands whose stdout carries the result.
    Cli,
}

/// Derive the active execution context from a parsed CLI command.
pub fn detect_context(command: &Command) -> ExecutionContext {
    match command {
        Command::Serve(_) => ExecutionContext::Server,
        Command::Reconcile(_) | Command::Env => ExecutionContext::Cli,
    }
}
