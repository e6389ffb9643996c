//! Configuration loading for `pscatter`.
//!
//! Loads configuration from:
//! 1. `~/.pscatter/config.toml` (global)
//! 2. `.pscatter/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

static CONFIG: Lazy<RwLock<ScanConfig>> = Lazy::new(|| {
    RwLock::new(ScanConfig::load().unwrap_or_else(|e| {
        eprintln!("[pscatter-config] WARNING: failed to load config: {e}. Using defaults.");
        ScanConfig::default()
    }))
});

/// Current config schema version.
pub const CONFIG_VERSION: u32 = 1;

pub fn config() -> std::sync::RwLockReadGuard<'static, ScanConfig> {
    CONFIG.read().unwrap()
}

pub fn reload() -> Result<(), ConfigError> {
    let new_config = ScanConfig::load()?;
    *CONFIG.write().unwrap() = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Engine-facing tunables (the scanner's thread pool and queue policy).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub scanner_threads: usize,
    pub dir_chunk: usize,
    pub dir_priority_count: usize,
    pub file_chunk: usize,
    pub file_q_cutoff: usize,
    pub file_q_min_cutoff: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scanner_threads: 16,
            dir_chunk: 50,
            dir_priority_count: 4,
            file_chunk: 100,
            file_q_cutoff: 1000,
            file_q_min_cutoff: 10,
        }
    }
}

/// Worker event-loop timers, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub poll_interval_secs: f64,
    pub stats_interval_secs: f64,
    pub dir_output_interval_secs: f64,
    pub dir_request_interval_secs: f64,
    /// Fallback share of the local directory queue to hand back when the
    /// coordinator's `ClientReqDirList` doesn't name a `pct`.
    pub dir_request_percentage: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1.0,
            stats_interval_secs: 30.0,
            dir_output_interval_secs: 5.0,
            dir_request_interval_secs: 2.0,
            dir_request_percentage: 0.5,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs_f64(self.stats_interval_secs)
    }
    pub fn dir_output_interval(&self) -> Duration {
        Duration::from_secs_f64(self.dir_output_interval_secs)
    }
    pub fn dir_request_interval(&self) -> Duration {
        Duration::from_secs_f64(self.dir_request_interval_secs)
    }
}

/// Coordinator event-loop timers and rebalancing policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub queue_timeout_secs: f64,
    pub stats_interval_secs: f64,
    pub request_work_interval_secs: f64,
    pub request_work_percentage: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            queue_timeout_secs: 1.0,
            stats_interval_secs: 30.0,
            request_work_interval_secs: 5.0,
            request_work_percentage: 0.5,
        }
    }
}

impl CoordinatorConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.queue_timeout_secs)
    }
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs_f64(self.stats_interval_secs)
    }
    pub fn request_work_interval(&self) -> Duration {
        Duration::from_secs_f64(self.request_work_interval_secs)
    }
}

/// Sink forwarder pool policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    pub forwarder_threads: usize,
    pub max_send_q_size: usize,
    pub send_q_sleep_secs: f64,
    pub max_q_wait_loops: u32,
    pub flush_deadline_secs: f64,
    pub backoff_initial_secs: f64,
    pub backoff_max_secs: f64,
    pub backoff_max_retries: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            forwarder_threads: 4,
            max_send_q_size: 10_000,
            send_q_sleep_secs: 0.1,
            max_q_wait_loops: 50,
            flush_deadline_secs: 120.0,
            backoff_initial_secs: 0.5,
            backoff_max_secs: 30.0,
            backoff_max_retries: 8,
        }
    }
}

impl SinkConfig {
    pub fn send_q_sleep(&self) -> Duration {
        Duration::from_secs_f64(self.send_q_sleep_secs)
    }
    pub fn flush_deadline(&self) -> Duration {
        Duration::from_secs_f64(self.flush_deadline_secs)
    }
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_initial_secs)
    }
    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_max_secs)
    }
}

/// TCP listen/connect policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub listen_addr: String,
    pub connect_addr: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7932".to_string(),
            connect_addr: "127.0.0.1:7932".to_string(),
        }
    }
}

/// Root configuration structure, assembled from global config, project
/// config, and environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    pub config_version: u32,
    pub network: NetworkConfig,
    pub engine: EngineConfig,
    pub worker: WorkerConfig,
    pub coordinator: CoordinatorConfig,
    pub sink: SinkConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            network: NetworkConfig::default(),
            engine: EngineConfig::default(),
            worker: WorkerConfig::default(),
            coordinator: CoordinatorConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_for_project(Path::new("."))
    }

    /// Resolution order: global → project → env vars.
    pub fn load_for_project(project_root: &Path) -> Result<Self, ConfigError> {
        let mut config = ScanConfig::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(&global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        let project_config_path = project_root.join(".pscatter/config.toml");
        if project_config_path.exists() {
            debug!("loading project config from {:?}", project_config_path);
            let contents = std::fs::read_to_string(&project_config_path)?;
            let project_config: ScanConfig = toml::from_str(&contents)?;
            config.merge(project_config);
        }

        config.apply_env_overrides();

        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".pscatter/config.toml"))
    }

    /// Merge another config (project overrides global): non-default values
    /// in `other` replace the corresponding value in `self`.
    fn merge(&mut self, other: ScanConfig) {
        if other.network != NetworkConfig::default() {
            self.network = other.network;
        }
        if other.engine != EngineConfig::default() {
            self.engine = other.engine;
        }
        if other.worker != WorkerConfig::default() {
            self.worker = other.worker;
        }
        if other.coordinator != CoordinatorConfig::default() {
            self.coordinator = other.coordinator;
        }
        if other.sink != SinkConfig::default() {
            self.sink = other.sink;
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("PSCATTER_LISTEN_ADDR") {
            self.network.listen_addr = addr;
        }
        if let Ok(addr) = std::env::var("PSCATTER_CONNECT_ADDR") {
            self.network.connect_addr = addr;
        }
        if let Ok(threads) = std::env::var("PSCATTER_THREADS") {
            if let Ok(n) = threads.parse() {
                self.engine.scanner_threads = n;
            }
        }
        if let Ok(interval) = std::env::var("PSCATTER_STATS_INTERVAL") {
            if let Ok(secs) = interval.parse() {
                self.worker.stats_interval_secs = secs;
                self.coordinator.stats_interval_secs = secs;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_self_consistent() {
        let config = ScanConfig::default();
        assert_eq!(config.engine.scanner_threads, 16);
        assert_eq!(config.engine.dir_priority_count, 4);
        assert_eq!(config.worker.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.sink.flush_deadline(), Duration::from_secs(120));
        assert_eq!(
            config.coordinator.request_work_interval(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn project_config_overrides_defaults() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".pscatter")).unwrap();
        std::fs::write(
            dir.path().join(".pscatter/config.toml"),
            "[engine]\nscanner_threads = 4\n",
        )
        .unwrap();

        let config = ScanConfig::load_for_project(dir.path()).unwrap();
        assert_eq!(config.engine.scanner_threads, 4);
        // untouched sections keep their defaults
        assert_eq!(config.sink.forwarder_threads, 4);
    }

    #[test]
    fn env_override_wins_over_project_config() {
        let dir = tempdir().unwrap();
        std::env::set_var("PSCATTER_THREADS", "9");
        let config = ScanConfig::load_for_project(dir.path()).unwrap();
        std::env::remove_var("PSCATTER_THREADS");
        assert_eq!(config.engine.scanner_threads, 9);
    }
}
