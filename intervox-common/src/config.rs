//! Configuration loading
//!
//! Configuration is resolved in priority order:
//! 1. `--config` command-line argument
//! 2. `INTERVOX_CONFIG` environment variable
//! 3. `~/.config/intervox/intervox.toml`
//! 4. Compiled defaults
//!
//! A handful of keys can additionally be overridden through dedicated
//! environment variables, which is convenient for containerized deploys.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub worker: WorkerConfig,
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub genscore: RemoteServiceConfig,
    pub speech: RemoteServiceConfig,
}

/// Bind ports for the API and the SSE notification endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub sseport: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 8323,
            sseport: 8324,
        }
    }
}

/// Session engine tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-question answer deadline, seconds
    pub question_timeout: u64,
    /// Default page size for list endpoints
    pub page_size: i64,
    /// How many trailing question/answer pairs are sent to the generator
    pub context_qa_length: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            question_timeout: 120,
            page_size: 10,
            context_qa_length: 3,
        }
    }
}

/// Preparation worker pool sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of workers
    pub size: usize,
    /// Queue capacity factor: capacity = size * max_tasks_per_worker
    pub max_tasks_per_worker: usize,
    /// Idle seconds before a worker exits
    pub max_idle_time: u64,
    /// Seconds an enqueue may block on a full queue before dropping
    pub max_task_wait_time: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            size: 4,
            max_tasks_per_worker: 4,
            max_idle_time: 60,
            max_task_wait_time: 2,
        }
    }
}

impl WorkerConfig {
    pub fn queue_capacity(&self) -> usize {
        (self.size * self.max_tasks_per_worker).max(1)
    }

    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_time)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_task_wait_time)
    }
}

/// Store connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// SQLite database file path; empty selects the platform data dir
    pub path: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            path: String::new(),
        }
    }
}

impl DbConfig {
    /// Resolve the database file path, falling back to the OS data dir.
    pub fn resolve_path(&self) -> PathBuf {
        if !self.path.is_empty() {
            return PathBuf::from(&self.path);
        }
        dirs::data_local_dir()
            .map(|d| d.join("intervox"))
            .unwrap_or_else(|| PathBuf::from("./intervox_data"))
            .join("intervox.db")
    }
}

/// Optional cache back-end; an empty address selects the no-op stub
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub address: String,
    pub namespace: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            address: String::new(),
            namespace: "intervox".to_string(),
        }
    }
}

/// Base URL of a remote AI service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteServiceConfig {
    pub url: String,
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        RemoteServiceConfig {
            url: String::new(),
        }
    }
}

impl Config {
    /// Load configuration following the documented priority order.
    pub fn load(cli_path: Option<&Path>) -> Result<Config> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
            }
            Some(path) => {
                tracing::debug!("Config file {} not found, using defaults", path.display());
                Config::default()
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("INTERVOX_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(path) = std::env::var("INTERVOX_DB_PATH") {
            self.db.path = path;
        }
        if let Ok(url) = std::env::var("INTERVOX_GENSCORE_URL") {
            self.genscore.url = url;
        }
        if let Ok(url) = std::env::var("INTERVOX_SPEECH_URL") {
            self.speech.url = url;
        }
    }

    pub fn question_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.question_timeout)
    }
}

fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("INTERVOX_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("intervox").join("intervox.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8323);
        assert_eq!(config.engine.question_timeout, 120);
        assert_eq!(config.engine.page_size, 10);
        assert_eq!(config.worker.size, 4);
        assert_eq!(config.worker.queue_capacity(), 16);
        assert!(config.redis.address.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 9000

            [engine]
            question_timeout = 45

            [worker]
            size = 2
            max_tasks_per_worker = 3

            [genscore]
            url = "http://genscore.local"
            "#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.engine.question_timeout, 45);
        assert_eq!(config.worker.queue_capacity(), 6);
        assert_eq!(config.genscore.url, "http://genscore.local");
        // Unspecified sections keep their defaults
        assert_eq!(config.server.sseport, 8324);
        assert_eq!(config.engine.page_size, 10);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/intervox.toml"))).unwrap();
        assert_eq!(config.server.port, 8323);
    }
}
