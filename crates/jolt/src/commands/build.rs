//! One-shot build command.

use anyhow::{Context, Result};
use jolt_build::Bundler;

use crate::config::Project;

/// Run the build command.
pub async fn run(project: Project) -> Result<()> {
    let config = project.build_configuration();
    tracing::info!("Building {}...", config.entrypoint.display());

    let result = project
        .bundler()
        .bundle(&config)
        .await
        .context("Build failed")?;

    tracing::info!(
        "Built {} in {}ms",
        result.output_dir.display(),
        result.duration_ms
    );

    Ok(())
}
