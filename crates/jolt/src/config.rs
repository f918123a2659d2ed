//! Project configuration (jolt.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jolt_build::{command::DEFAULT_ARGS, BuildConfiguration, CommandBundler, Target};
use jolt_server::DevServerConfig;
use serde::Deserialize;

/// Configuration file structure (jolt.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub paths: PathsConfig,
    pub server: ServerSettings,
    pub build: BuildSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub public: PathBuf,
    pub source: PathBuf,
    pub build: PathBuf,
    pub entrypoint: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            public: PathBuf::from("public"),
            source: PathBuf::from("src"),
            build: PathBuf::from("build"),
            entrypoint: PathBuf::from("src/main.tsx"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub target: Target,
    pub splitting: bool,
    pub public_path: String,
    /// Bundler program
    pub command: String,
    /// Argument templates, see [`CommandBundler`]
    pub args: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            target: Target::Browser,
            splitting: true,
            public_path: "/".to_string(),
            command: "bun".to_string(),
            args: DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A project root plus its resolved configuration.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    file: ConfigFile,
}

impl Project {
    /// Load configuration from `config` (relative to `root`) if it exists.
    /// Returns an error if the config file exists but is malformed.
    pub fn load(root: &Path, config: &Path) -> Result<Self> {
        let config_path = root.join(config);

        let file = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let file: ConfigFile = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?;
            tracing::info!("Loaded config from {}", config_path.display());
            file
        } else {
            tracing::debug!("No {}, using defaults", config_path.display());
            ConfigFile::default()
        };

        Ok(Self {
            root: root.to_path_buf(),
            file,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn build_configuration(&self) -> BuildConfiguration {
        BuildConfiguration {
            entrypoint: self.resolve(&self.file.paths.entrypoint),
            outdir: self.resolve(&self.file.paths.build),
            target: self.file.build.target,
            splitting: self.file.build.splitting,
            public_path: self.file.build.public_path.clone(),
        }
    }

    pub fn bundler(&self) -> CommandBundler {
        CommandBundler::new(self.file.build.command.clone(), self.file.build.args.clone())
    }

    /// Server settings with command-line overrides applied.
    pub fn server_config(
        &self,
        host: Option<String>,
        port: Option<u16>,
        open: bool,
    ) -> DevServerConfig {
        DevServerConfig {
            public_dir: self.resolve(&self.file.paths.public),
            source_dir: self.resolve(&self.file.paths.source),
            build_dir: self.resolve(&self.file.paths.build),
            host: host.unwrap_or_else(|| self.file.server.host.clone()),
            port: port.unwrap_or(self.file.server.port),
            open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let project = Project::load(temp.path(), Path::new("jolt.toml")).unwrap();
        let build = project.build_configuration();

        assert_eq!(build.entrypoint, temp.path().join("src/main.tsx"));
        assert_eq!(build.outdir, temp.path().join("build"));
        assert_eq!(build.target, Target::Browser);
        assert_eq!(project.bundler().program(), "bun");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("jolt.toml"),
            r#"
[server]
port = 8080

[build]
target = "node"
splitting = false
"#,
        )
        .unwrap();

        let project = Project::load(temp.path(), Path::new("jolt.toml")).unwrap();
        let server = project.server_config(None, None, false);
        let build = project.build_configuration();

        assert_eq!(server.port, 8080);
        assert_eq!(server.host, "localhost");
        assert_eq!(server.public_dir, temp.path().join("public"));
        assert_eq!(build.target, Target::Node);
        assert!(!build.splitting);
        assert_eq!(build.public_path, "/");
    }

    #[test]
    fn command_line_overrides_file() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("jolt.toml"), "[server]\nhost = \"0.0.0.0\"\n").unwrap();

        let project = Project::load(temp.path(), Path::new("jolt.toml")).unwrap();
        let server = project.server_config(Some("127.0.0.1".to_string()), Some(9000), true);

        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 9000);
        assert!(server.open);
    }

    #[cfg(unix)]
    #[test]
    fn custom_bundler_command() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("jolt.toml"),
            r#"
[paths]
entrypoint = "app/index.ts"
build = "/tmp/jolt-out"

[build]
command = "esbuild"
args = ["{entrypoint}", "--bundle", "--outdir={outdir}"]
"#,
        )
        .unwrap();

        let project = Project::load(temp.path(), Path::new("jolt.toml")).unwrap();
        let build = project.build_configuration();
        let args = project.bundler().expand_args(&build);

        assert_eq!(build.outdir, PathBuf::from("/tmp/jolt-out"));
        assert_eq!(
            args,
            vec![
                temp.path().join("app/index.ts").display().to_string(),
                "--bundle".to_string(),
                "--outdir=/tmp/jolt-out".to_string(),
            ]
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("jolt.toml"), "[server\nport = ").unwrap();

        assert!(Project::load(temp.path(), Path::new("jolt.toml")).is_err());
    }
}
