use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing at an optional TOML config file.
pub const CONFIG_ENV_VAR: &str = "TRIVY_TASK_CONFIG";

/// Fixed values the task runs with, loaded once and injected into the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Version substituted when `latest` is requested
    pub default_version: String,

    /// Scratch directory for the archive, the binary, and scan output
    pub temp_dir: PathBuf,

    pub release_base_url: String,

    /// Program used in container mode (e.g. `docker`, `podman`)
    pub container_runtime: String,

    /// Image repository, tagged with the requested version
    pub container_image: String,

    /// Overall limit for the release download; unset means wait as long as
    /// it takes
    pub download_timeout_secs: Option<u64>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            default_version: "v0.29.2".to_string(),
            temp_dir: PathBuf::from("/tmp"),
            release_base_url: "https://github.com/aquasecurity/trivy/releases/download".to_string(),
            container_runtime: "docker".to_string(),
            container_image: "aquasec/trivy".to_string(),
            download_timeout_secs: None,
        }
    }
}

impl TaskConfig {
    /// Path the scanner binary is installed to.
    pub fn binary_path(&self) -> PathBuf {
        self.temp_dir.join("trivy")
    }

    /// Path the release archive is downloaded to.
    pub fn archive_path(&self) -> PathBuf {
        self.temp_dir.join("trivy.tar.gz")
    }

    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| ScanError::Config {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<TaskConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ScanError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    TaskConfig::from_toml_str(&content, path)
}

/// Resolve configuration: an explicit path wins, then `TRIVY_TASK_CONFIG`,
/// then the built-in defaults.
pub fn load_config_or_default(explicit: Option<&Path>) -> Result<TaskConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => load_config(Path::new(path.trim())),
        _ => Ok(TaskConfig::default()),
    }
}
