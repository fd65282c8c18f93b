//! Configuration primitives and loader for the tex-doc toolkit.
//!
//! Settings resolve with the precedence stack
//! override flag → working directory → built-in defaults, and are normalised
//! into typed structures so downstream crates never touch raw TOML.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".tex-doc.toml";

const DEFAULT_MAX_PASSES: u32 = 2;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_ENGINE: &str = "pdflatex";

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub workspace: WorkspaceSettings,
    pub compile: CompileSettings,
    /// Path of the file the on-disk layer came from, if any.
    pub source_path: Option<PathBuf>,
}

/// Settings that declare the workspace boundary.
#[derive(Clone, Debug)]
pub struct WorkspaceSettings {
    /// Absolute root directory all operations are confined to.
    pub root: PathBuf,
}

/// Settings that govern compilation defaults.
#[derive(Clone, Debug)]
pub struct CompileSettings {
    /// Engine name used when a request does not name one.
    pub engine: String,
    /// Explicit engine binary location; falls back to `$PATH` lookup.
    pub engine_path: Option<PathBuf>,
    /// Upper bound on sequential compiler passes per request.
    pub max_passes: u32,
    /// Per-pass wall clock budget in seconds.
    pub timeout_secs: u64,
}

/// Options controlling configuration resolution.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config override not found: {path}")]
    OverrideNotFound { path: PathBuf },

    #[error("failed to resolve working directory: {source}")]
    WorkingDirectory { source: io::Error },

    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    /// Resolve configuration for the given options.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let local_config_path = working_dir.join(CONFIG_FILE_NAME);
        let layer_path = match override_path {
            Some(path) => Some(path),
            None if local_config_path.exists() => Some(local_config_path),
            None => None,
        };

        let raw = match &layer_path {
            Some(path) => load_layer(path)?,
            None => RawConfig::default(),
        };

        raw.finalize(&working_dir, layer_path)
    }

    /// Serialise the current settings back to TOML, for persisting a
    /// workspace-root change.
    pub fn to_toml(&self) -> String {
        let raw = RawConfig {
            workspace: Some(RawWorkspace {
                root: Some(self.workspace.root.clone()),
            }),
            compile: Some(RawCompile {
                engine: Some(self.compile.engine.clone()),
                engine_path: self.compile.engine_path.clone(),
                max_passes: Some(self.compile.max_passes),
                timeout_secs: Some(self.compile.timeout_secs),
            }),
        };
        toml::to_string_pretty(&raw).unwrap_or_default()
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => {
            fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory { source })
        }
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory { source }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_layer(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace: Option<RawWorkspace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compile: Option<RawCompile>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawWorkspace {
    #[serde(skip_serializing_if = "Option::is_none")]
    root: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawCompile {
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_passes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
}

impl RawConfig {
    fn finalize(
        self,
        working_dir: &Path,
        source_path: Option<PathBuf>,
    ) -> Result<Config, ConfigError> {
        let raw_workspace = self.workspace.unwrap_or_default();
        let raw_compile = self.compile.unwrap_or_default();

        let root = raw_workspace
            .root
            .map(|root| make_absolute(&root, working_dir))
            .unwrap_or_else(|| working_dir.to_path_buf());

        let max_passes = raw_compile.max_passes.unwrap_or(DEFAULT_MAX_PASSES);
        if max_passes == 0 {
            return Err(ConfigError::Validation(
                "compile.max-passes must be at least 1".to_string(),
            ));
        }

        let timeout_secs = raw_compile.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "compile.timeout-secs must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            workspace: WorkspaceSettings { root },
            compile: CompileSettings {
                engine: raw_compile
                    .engine
                    .unwrap_or_else(|| DEFAULT_ENGINE.to_string()),
                engine_path: raw_compile
                    .engine_path
                    .map(|path| make_absolute(&path, working_dir)),
                max_passes,
                timeout_secs,
            },
            source_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_without_config_file() {
        let temp = TempDir::new().expect("tempdir");
        let config = Config::load(LoadOptions::default().with_working_dir(temp.path()))
            .expect("load config");

        assert_eq!(
            config.workspace.root,
            fs::canonicalize(temp.path()).unwrap()
        );
        assert_eq!(config.compile.engine, "pdflatex");
        assert_eq!(config.compile.max_passes, 2);
        assert_eq!(config.compile.timeout_secs, 60);
        assert!(config.source_path.is_none());
    }

    #[test]
    fn local_file_overrides_defaults() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            r#"
            [workspace]
            root = "docs"

            [compile]
            engine = "xelatex"
            max-passes = 3
            timeout-secs = 90
            "#,
        )
        .expect("write config");

        let config = Config::load(LoadOptions::default().with_working_dir(temp.path()))
            .expect("load config");

        let canonical = fs::canonicalize(temp.path()).unwrap();
        assert_eq!(config.workspace.root, canonical.join("docs"));
        assert_eq!(config.compile.engine, "xelatex");
        assert_eq!(config.compile.max_passes, 3);
        assert_eq!(config.compile.timeout_secs, 90);
    }

    #[test]
    fn zero_max_passes_is_rejected() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[compile]\nmax-passes = 0\n",
        )
        .expect("write config");

        let err = Config::load(LoadOptions::default().with_working_dir(temp.path()))
            .expect_err("zero passes must fail");
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn missing_override_is_reported() {
        let temp = TempDir::new().expect("tempdir");
        let err = Config::load(
            LoadOptions::default()
                .with_working_dir(temp.path())
                .with_override_path("absent.toml"),
        )
        .expect_err("missing override must fail");
        assert!(matches!(err, ConfigError::OverrideNotFound { .. }));
    }

    #[test]
    fn round_trips_through_toml() {
        let temp = TempDir::new().expect("tempdir");
        let config = Config::load(LoadOptions::default().with_working_dir(temp.path()))
            .expect("load config");

        let rendered = config.to_toml();
        let reparsed: RawConfig = toml::from_str(&rendered).expect("reparse");
        assert_eq!(
            reparsed.workspace.and_then(|w| w.root),
            Some(config.workspace.root)
        );
    }
}
