use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;

/// Namespace keys for the local backend's durable blobs. Each entity type
/// persists as a single JSON snapshot named after its namespace.
pub static TASKS_NAMESPACE: &str = "taskflow_tasks";
pub static CATEGORIES_NAMESPACE: &str = "taskflow_categories";

/// Color token applied to categories that arrive without one.
pub static DEFAULT_CATEGORY_COLOR: &str = "#5B4FE8";

static ENV_DATA_DIR: &str = "TASKFLOW_DATA_DIR";
static ENV_REMOTE_URL: &str = "TASKFLOW_REMOTE_URL";

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "taskflow", "taskflow"));

/// Which persistence backend the process drives. Selected explicitly at
/// startup; nothing switches backends mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    data_dir: PathBuf,
    backend: BackendKind,
    remote_url: Option<String>,
}

impl AppConfig {
    /// Construct [`AppConfig`] by resolving the data directory using the provided override,
    /// environment variables, and platform defaults.
    pub fn discover(
        data_dir_override: Option<PathBuf>,
        backend: BackendKind,
        remote_url_override: Option<String>,
    ) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir_override)?;
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory at {}", data_dir.display())
            })?;
        }
        let remote_url = remote_url_override.or_else(|| env::var(ENV_REMOTE_URL).ok());
        Ok(Self {
            data_dir,
            backend,
            remote_url,
        })
    }

    /// Construct [`AppConfig`] directly from a resolved data directory.
    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            data_dir,
            backend: BackendKind::Local,
            remote_url: None,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    /// Path of the durable blob for the given namespace.
    pub fn blob_path(&self, namespace: &str) -> PathBuf {
        self.data_dir.join(format!("{namespace}.json"))
    }
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }

    if let Ok(env_dir) = env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(env_dir));
    }

    if cfg!(debug_assertions) {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let dev_dir = manifest_dir.join("tmp").join("dev-taskflow");
        return Ok(dev_dir);
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Ok(project.data_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".taskflow"));
    }

    Ok(env::current_dir()?.join(".taskflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn blob_path_uses_namespace_file_stem() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).unwrap();
        let path = config.blob_path(TASKS_NAMESPACE);
        assert_eq!(path, dir.path().join("taskflow_tasks.json"));
    }

    #[test]
    fn from_data_dir_defaults_to_local_backend() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.backend(), BackendKind::Local);
        assert!(config.remote_url().is_none());
    }
}
