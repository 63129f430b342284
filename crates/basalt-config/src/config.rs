//! Typed settings sections, their defaults, and `config.ron` persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Name of the settings file inside the config directory.
const CONFIG_FILE: &str = "config.ron";

/// Root of all engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Frame pacing settings.
    pub frame: FrameConfig,
    /// Developer toggles.
    pub debug: DebugConfig,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads (0 = auto: logical cores minus one).
    pub worker_count: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { worker_count: 0 }
    }
}

/// Frame pacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    /// Target frame rate cap in Hz (0 = unlimited).
    pub frame_limit_hz: u32,
    /// Upper bound on the delta time reported to systems, in seconds.
    /// Keeps simulations stable after long stalls.
    pub max_delta_seconds: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_limit_hz: 0,
            max_delta_seconds: 0.25,
        }
    }
}

/// Developer toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Collect per-system and per-phase timing.
    pub profiling_enabled: bool,
    /// Log filter override, same syntax as `RUST_LOG` (e.g. "debug").
    pub log_level: String,
    /// Dump the system execution graph as DOT after it is built.
    pub dump_schedule_graph: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            profiling_enabled: false,
            log_level: "info".to_string(),
            dump_schedule_graph: false,
        }
    }
}

impl Config {
    /// Reads the settings from `dir`, seeding a default `config.ron` on
    /// first run.
    pub fn load_or_create(dir: &Path) -> Result<Self, ConfigError> {
        let path = settings_path(dir);
        if !path.exists() {
            let defaults = Config::default();
            defaults.save(dir)?;
            info!(path = %path.display(), "seeded default config");
            return Ok(defaults);
        }
        let config = read_settings(&path)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Writes the settings into `dir`, creating the directory as needed.
    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::Render)?;
        let path = settings_path(dir);
        std::fs::write(&path, text).map_err(|source| ConfigError::Io { path, source })
    }

    /// Picks up edits made to the file since this value was loaded.
    /// Returns the fresh settings, or `None` when nothing changed.
    pub fn reload(&self, dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_settings(&settings_path(dir))?;
        if fresh == *self {
            return Ok(None);
        }
        info!("config file changed, applying");
        Ok(Some(fresh))
    }
}

fn settings_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

fn read_settings(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(ConfigError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_render_to_ron() {
        let text =
            ron::ser::to_string_pretty(&Config::default(), ron::ser::PrettyConfig::default())
                .unwrap();
        assert!(text.contains("worker_count: 0"));
        assert!(text.contains("frame_limit_hz: 0"));
    }

    #[test]
    fn test_ron_roundtrip_preserves_values() {
        let mut config = Config::default();
        config.frame.frame_limit_hz = 240;
        config.debug.log_level = "trace".to_string();
        let text = ron::to_string(&config).unwrap();
        assert_eq!(ron::from_str::<Config>(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_section_falls_back_to_default() {
        let config: Config = ron::from_str("(scheduler: (), frame: ())").unwrap();
        assert_eq!(config.debug, DebugConfig::default());
        assert_eq!(config.frame, FrameConfig::default());
    }

    #[test]
    fn test_stall_clamp_defaults_to_a_quarter_second() {
        let config = Config::default();
        assert!((config.frame.max_delta_seconds - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_first_run_seeds_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.scheduler.worker_count = 6;
        config.debug.profiling_enabled = true;
        config.save(dir.path()).unwrap();

        assert_eq!(Config::load_or_create(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_reload_sees_on_disk_edits() {
        let dir = tempfile::tempdir().unwrap();
        let stale = Config::default();
        stale.save(dir.path()).unwrap();

        let mut edited = stale.clone();
        edited.frame.frame_limit_hz = 60;
        edited.save(dir.path()).unwrap();

        let fresh = stale.reload(dir.path()).unwrap();
        assert_eq!(fresh.unwrap().frame.frame_limit_hz, 60);
    }

    #[test]
    fn test_reload_is_quiet_without_edits() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "(scheduler: (worker_count: banana))",
        )
        .unwrap();
        assert!(matches!(
            Config::load_or_create(dir.path()),
            Err(ConfigError::Malformed(_))
        ));
    }
}
