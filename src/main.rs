use clap::Parser;
use std::process::ExitCode;
use waveline::cli::{self, Args};
use waveline::core::error::{AppError, DefaultErrorReporter, ErrorReporter};
use waveline::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match logging::init(&args.command) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("[WARN] logging disabled: {:#}", err);
            None
        }
    };

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error = match err.downcast::<AppError>() {
                Ok(app_error) => app_error,
                Err(other) => AppError::from(other),
            };
            DefaultErrorReporter::new().report_error(&error);
            ExitCode::FAILURE
        }
    }
}
