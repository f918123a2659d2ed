//! Bundler backed by an external command-line tool.

use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use crate::builder::{BuildConfiguration, BuildError, BuildReport, Bundler};

/// Arguments used when none are configured. Mirrors `bun build`.
pub const DEFAULT_ARGS: &[&str] = &[
    "build",
    "{entrypoint}",
    "--outdir",
    "{outdir}",
    "--target",
    "{target}",
    "{splitting}",
    "--public-path",
    "{public_path}",
];

/// Runs an external bundler program once per build.
///
/// Arguments are templates. `{entrypoint}`, `{outdir}`, `{target}` and
/// `{public_path}` are substituted anywhere inside an argument; an argument
/// that is exactly `{splitting}` becomes `--splitting` or is dropped.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    args: Vec<String>,
}

impl CommandBundler {
    /// Create a bundler that runs `program` with the given argument templates.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The program that will be spawned.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expand the argument templates against a configuration.
    pub fn expand_args(&self, config: &BuildConfiguration) -> Vec<String> {
        let entrypoint = config.entrypoint.display().to_string();
        let outdir = config.outdir.display().to_string();
        let target = config.target.to_string();

        self.args
            .iter()
            .filter_map(|arg| {
                if arg == "{splitting}" {
                    return config.splitting.then(|| "--splitting".to_string());
                }
                Some(
                    arg.replace("{entrypoint}", &entrypoint)
                        .replace("{outdir}", &outdir)
                        .replace("{target}", &target)
                        .replace("{public_path}", &config.public_path),
                )
            })
            .collect()
    }
}

impl Default for CommandBundler {
    fn default() -> Self {
        Self::new("bun", DEFAULT_ARGS.iter().map(|s| s.to_string()).collect())
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn bundle(&self, config: &BuildConfiguration) -> Result<BuildReport, BuildError> {
        let start = Instant::now();

        tokio::fs::create_dir_all(&config.outdir)
            .await
            .map_err(|source| BuildError::OutputDir {
                path: config.outdir.clone(),
                source,
            })?;

        let args = self.expand_args(config);
        tracing::debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BuildError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!("{}", line);
        }

        Ok(BuildReport {
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: config.outdir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Target;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config_in(outdir: PathBuf) -> BuildConfiguration {
        BuildConfiguration {
            entrypoint: PathBuf::from("src/main.tsx"),
            outdir,
            target: Target::Browser,
            splitting: true,
            public_path: "/".to_string(),
        }
    }

    #[test]
    fn expands_default_arguments() {
        let bundler = CommandBundler::default();
        let args = bundler.expand_args(&config_in(PathBuf::from("build")));

        assert_eq!(
            args,
            vec![
                "build",
                "src/main.tsx",
                "--outdir",
                "build",
                "--target",
                "browser",
                "--splitting",
                "--public-path",
                "/",
            ]
        );
    }

    #[test]
    fn drops_splitting_flag_when_disabled() {
        let bundler = CommandBundler::default();
        let mut config = config_in(PathBuf::from("build"));
        config.splitting = false;

        let args = bundler.expand_args(&config);

        assert!(!args.iter().any(|a| a == "--splitting" || a == "{splitting}"));
    }

    #[test]
    fn substitutes_tokens_inside_arguments() {
        let bundler = CommandBundler::new("esbuild", vec!["--outdir={outdir}".to_string()]);
        let args = bundler.expand_args(&config_in(PathBuf::from("dist")));

        assert_eq!(args, vec!["--outdir=dist"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_command_and_creates_output_dir() {
        let temp = tempdir().unwrap();
        let outdir = temp.path().join("build");
        let bundler = CommandBundler::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo {target} > {outdir}/target.txt".to_string(),
            ],
        );

        let report = bundler.bundle(&config_in(outdir.clone())).await.unwrap();

        assert_eq!(report.output_dir, outdir);
        let written = std::fs::read_to_string(outdir.join("target.txt")).unwrap();
        assert_eq!(written.trim(), "browser");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn surfaces_non_zero_exit() {
        let temp = tempdir().unwrap();
        let bundler = CommandBundler::new(
            "sh",
            vec!["-c".to_string(), "echo broken import >&2; exit 3".to_string()],
        );

        let err = bundler
            .bundle(&config_in(temp.path().join("build")))
            .await
            .unwrap_err();

        match err {
            BuildError::Failed { stderr, .. } => assert_eq!(stderr, "broken import"),
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_missing_program() {
        let temp = tempdir().unwrap();
        let bundler = CommandBundler::new("jolt-no-such-bundler", Vec::new());

        let err = bundler
            .bundle(&config_in(temp.path().join("build")))
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::Spawn { .. }));
    }
}
