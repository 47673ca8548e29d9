use anyhow::Result;
use locale_sync::{config, pipeline, toolchain};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when not present)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("locale_sync=info".parse()?),
        )
        .init();

    info!("Starting locale sync");

    // Load configuration and credential once, up front
    let config = config::Config::from_env()?;
    let credential = config::load_credential(&config);
    let (extractor, compiler) = toolchain::select(config.toolchain);

    let report = pipeline::run(&config, credential.as_ref(), extractor.as_ref(), compiler.as_ref()).await?;

    if !report.compiled.failed.is_empty() {
        for failure in &report.compiled.failed {
            error!("{}: {}", failure.code, failure.reason);
        }
        anyhow::bail!(
            "{} of {} locales failed to compile",
            report.compiled.failed.len(),
            report.compiled.failed.len() + report.compiled.compiled.len()
        );
    }

    info!(
        "Locale sync complete: {} locales installed{}",
        report.compiled.compiled.len(),
        if report.pushed { "" } else { " (local-only, template not uploaded)" }
    );
    Ok(())
}
