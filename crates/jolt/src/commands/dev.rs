//! Development server command.

use std::sync::Arc;

use anyhow::Result;
use jolt_server::DevServer;

use crate::config::Project;

/// Run the dev server.
pub async fn run(
    project: Project,
    host: Option<String>,
    port: Option<u16>,
    open: bool,
) -> Result<()> {
    let config = project.server_config(host, port, open);
    let build = project.build_configuration();

    tracing::info!(
        "Bundling {} into {} with {}",
        build.entrypoint.display(),
        build.outdir.display(),
        project.bundler().program()
    );

    DevServer::new(config, build, Arc::new(project.bundler()))
        .start()
        .await?;

    Ok(())
}
