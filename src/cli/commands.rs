use crate::{
    cli::args::{ReconcileArgs, ServeArgs},
    core::{
        config::{ConfigLoader, ConfigValidator},
        error::AppError,
        pipeline::DecisionPipeline,
        types::ErrorCategory,
    },
    server, Result,
};
use anyhow::Context;
use serde_json::Value;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = ConfigLoader::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
        ConfigValidator::validate(&config)?;
    }

    let pipeline = Arc::new(DecisionPipeline::from_config(&config)?);
    info!(
        backend = %config.provider.backend,
        bind = %config.server.bind,
        "starting waveline service"
    );
    server::serve(pipeline, &config.server).await?;
    Ok(())
}

pub async fn reconcile(args: ReconcileArgs) -> Result<()> {
    let config = ConfigLoader::load(args.config.as_deref())?;
    let raw = read_input(&args.input)?;
    let steps = raw.as_array().ok_or_else(|| {
        AppError::new(
            ErrorCategory::ValidationError,
            format!("{} must contain a JSON array of steps", args.input.display()),
        )
        .with_code("REQUEST-JSON-002")
    })?;

    let pipeline = DecisionPipeline::from_config(&config)?;
    let reconciled = pipeline.run(steps).await.map_err(AppError::from)?;
    let rendered = serde_json::to_string_pretty(&reconciled.steps)?;

    match args.output {
        Some(path) => {
            fs::write(&path, format!("{}\n", rendered))
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(output = %path.display(), steps = reconciled.steps.len(), "result written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", rendered)?;
        }
    }
    Ok(())
}

pub fn env() -> Result<()> {
    for line in ConfigLoader::env_var_documentation() {
        println!("{}", line);
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Value> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read steps from stdin")?;
        buffer
    } else {
        fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read input file {}: {}", path.display(), e),
            )
        })?
    };
    let value = serde_json::from_str(&content).map_err(|e| {
        AppError::new(
            ErrorCategory::ValidationError,
            format!("{} is not valid JSON: {}", path.display(), e),
        )
        .with_code("REQUEST-JSON-001")
    })?;
    Ok(value)
}
