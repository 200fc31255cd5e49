use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::calendar::ViewMode;
use crate::model::{normalize_clock_time, DEFAULT_END_TIME, DEFAULT_START_TIME};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "TaskFlow";
const APP_NAME: &str = "taskflow";

pub const CONFIG_ENV: &str = "TASKFLOW_CONFIG";
pub const DATA_ENV: &str = "TASKFLOW_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn from_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths);
            self.write_default_config(&default_cfg)?;
            tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_root.join("taskflow.db");

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
            log_dir,
            state_dir,
        })
    }

    /// Lays every path out under one root; used by tests and throwaway runs.
    pub fn rooted_at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        let state_dir = root.join("state");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            database_path: data_dir.join("taskflow.db"),
            data_dir,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("taskflow.log")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Event-loop poll interval.
    pub tick_rate_ms: u64,
    /// Refresh interval of the clock on the task screen.
    pub clock_tick_ms: u64,
    pub clock_24h: bool,
    pub calendar: CalendarOptions,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 250,
            clock_tick_ms: 1000,
            clock_24h: false,
            calendar: CalendarOptions::default(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        self.storage.resolve(paths);
        self.calendar.sanitize();
        if self.tick_rate_ms == 0 {
            tracing::warn!("tick_rate_ms must be positive, using 250");
            self.tick_rate_ms = 250;
        }
        if self.clock_tick_ms == 0 {
            tracing::warn!("clock_tick_ms must be positive, using 1000");
            self.clock_tick_ms = 1000;
        }
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.clock_tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarOptions {
    pub default_view: ViewMode,
    /// Start time pre-filled in the new-block form.
    pub default_start: String,
    pub default_end: String,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            default_view: ViewMode::Week,
            default_start: DEFAULT_START_TIME.to_string(),
            default_end: DEFAULT_END_TIME.to_string(),
        }
    }
}

impl CalendarOptions {
    fn sanitize(&mut self) {
        match normalize_clock_time(&self.default_start, "default_start") {
            Ok(time) => self.default_start = time,
            Err(err) => {
                tracing::warn!(%err, "falling back to {DEFAULT_START_TIME}");
                self.default_start = DEFAULT_START_TIME.to_string();
            }
        }
        match normalize_clock_time(&self.default_end, "default_end") {
            Ok(time) => self.default_end = time,
            Err(err) => {
                tracing::warn!(%err, "falling back to {DEFAULT_END_TIME}");
                self.default_end = DEFAULT_END_TIME.to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
    /// How long a connection waits on a lock held by another process.
    pub busy_timeout_ms: u64,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
            busy_timeout_ms: 5000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_load_writes_default_config() -> Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::from_paths(ConfigPaths::rooted_at(temp.path()));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.calendar.default_view, ViewMode::Week);
        assert_eq!(cfg.storage.database_path, loader.paths().database_path);

        let reloaded = loader.load()?;
        assert_eq!(reloaded.clock_tick_ms, 1000);
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults_and_repairs_times() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "clock_24h = true\n[calendar]\ndefault_view = \"month\"\ndefault_start = \"8:30\"\ndefault_end = \"late\"\n",
        )?;
        let cfg = ConfigLoader::from_paths(paths).load()?;
        assert!(cfg.clock_24h);
        assert_eq!(cfg.tick_rate_ms, 250);
        assert_eq!(cfg.calendar.default_view, ViewMode::Month);
        assert_eq!(cfg.calendar.default_start, "08:30");
        assert_eq!(cfg.calendar.default_end, DEFAULT_END_TIME);
        Ok(())
    }
}
