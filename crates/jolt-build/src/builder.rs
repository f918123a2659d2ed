//! Build configuration and the bundler seam.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

/// Platform the bundle is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Browser,
    Bun,
    Node,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Target::Browser => "browser",
            Target::Bun => "bun",
            Target::Node => "node",
        };
        f.write_str(tag)
    }
}

/// Configuration for building the application bundle.
///
/// Created once at startup and shared for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    /// Source file the bundler starts from
    pub entrypoint: PathBuf,

    /// Output directory, overwritten on every build
    pub outdir: PathBuf,

    /// Platform tag passed to the bundler
    pub target: Target,

    /// Emit shared chunks for dynamic imports
    pub splitting: bool,

    /// Base path prepended to asset URLs in the bundle
    pub public_path: String,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            entrypoint: PathBuf::from("src/main.tsx"),
            outdir: PathBuf::from("build"),
            target: Target::Browser,
            splitting: true,
            public_path: "/".to_string(),
        }
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start bundler `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Bundler exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Something that can turn an entrypoint into a bundle on disk.
///
/// The dev server only cares whether a build succeeded; how the bundle is
/// produced is up to the implementation.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Build the bundle described by `config`, writing into `config.outdir`.
    async fn bundle(&self, config: &BuildConfiguration) -> Result<BuildReport, BuildError>;
}
