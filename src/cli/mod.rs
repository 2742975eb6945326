pub mod args;
pub mod commands;

pub use args::{ReconcileArgs, ServeArgs};
use crate::core::config::loader::CONFIG_FILE_NAME;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "waveline")]
#[command(version = crate::VERSION)]
#[command(about = "Decision-step inference for ordered project plans")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: try a plan locally with `reconcile`, then run `serve` behind your gateway."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Start the HTTP service",
        long_about = "Serve exposes POST /api/v1/buildDecisionSteps, authenticated by the apiKey header, plus an unauthenticated GET /healthz.",
        after_help = "Example:\n    WAVELINE_API_KEY=secret waveline serve --bind 127.0.0.1:8000"
    )]
    Serve(ServeArgs),
    #[command(
        about = "Run the decision pipeline once over a JSON file",
        long_about = "Reconcile validates the steps, asks the configured provider for decision points, enriches them, and prints the renumbered sequence as JSON.",
        after_help = "Example:\n    waveline reconcile plan.json --output plan.decisions.json"
    )]
    Reconcile(ReconcileArgs),
    #[command(
        about = "List supported environment variables",
        after_help = "Example:\n    waveline env"
    )]
    Env,
}

impl Command {
    /// Config file the command reads, explicit or the default in the working directory.
    pub fn config_path(&self) -> PathBuf {
        let explicit = match self {
            Command::Serve(args) => args.config.clone(),
            Command::Reconcile(args) => args.config.clone(),
            Command::Env => None,
        };
        explicit.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }
}

pub async fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Serve(serve_args) => commands::serve(serve_args).await,
        Command::Reconcile(reconcile_args) => commands::reconcile(reconcile_args).await,
        Command::Env => commands::env(),
    }
}
