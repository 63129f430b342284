//! Command-line argument parsing for the Basalt engine core.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Basalt command-line arguments.
///
/// Any flag given here wins over the value read from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "basalt", about = "Basalt engine core")]
pub struct CliArgs {
    /// Number of worker threads (0 = auto).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Frame rate cap in Hz (0 = unlimited).
    #[arg(long)]
    pub frame_limit: Option<u32>,

    /// Enable per-system and per-phase profiling.
    #[arg(long)]
    pub profile: Option<bool>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Dump the system execution graph as DOT after build.
    #[arg(long)]
    pub dump_schedule: Option<bool>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(workers) = args.workers {
            self.scheduler.worker_count = workers;
        }
        if let Some(limit) = args.frame_limit {
            self.frame.frame_limit_hz = limit;
        }
        if let Some(profile) = args.profile {
            self.debug.profiling_enabled = profile;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(dump) = args.dump_schedule {
            self.debug.dump_schedule_graph = dump;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            workers: Some(4),
            frame_limit: None,
            profile: Some(true),
            log_level: None,
            dump_schedule: None,
            config: None,
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.scheduler.worker_count, 4);
        assert!(config.debug.profiling_enabled);
        // Non-overridden fields retain defaults
        assert_eq!(config.frame.frame_limit_hz, 0);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        let args = CliArgs {
            workers: None,
            frame_limit: None,
            profile: None,
            log_level: None,
            dump_schedule: None,
            config: None,
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config, original);
    }
}
