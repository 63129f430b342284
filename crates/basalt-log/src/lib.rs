//! Tracing setup for the Basalt engine core.
//!
//! One call wires the whole logging stack: an `EnvFilter` seeded from the
//! debug config with `RUST_LOG` taking precedence, a human-readable console
//! layer with uptime timestamps and thread names, and, for debug builds
//! given a log directory, a JSON sidecar file for post-mortem digging.

use std::fs::File;
use std::path::Path;

use basalt_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter applied when neither `RUST_LOG` nor the config says otherwise.
const DEFAULT_FILTER: &str = "info";

/// Name of the JSON sidecar file inside the log directory.
const LOG_FILE_NAME: &str = "basalt.log";

/// Installs the global tracing subscriber.
///
/// The console layer is always attached. The JSON file layer needs all
/// three of a debug build, a `log_dir`, and a creatable file; anything
/// missing degrades quietly to console-only output.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let console = fmt::layer()
        .with_target(true)
        .with_thread_names(true) // worker threads carry basalt-worker-N names
        .with_timer(fmt::time::uptime());

    let registry = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(console);

    match json_log_file(log_dir, debug_build) {
        Some(file) => {
            let sidecar = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(file)
                .with_timer(fmt::time::uptime());
            registry.with(sidecar).init();
        }
        None => registry.init(),
    }
}

/// The filter used when no configuration is supplied.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// Filter seeded from the config's `log_level`; `RUST_LOG` wins when set.
fn env_filter(config: Option<&Config>) -> EnvFilter {
    let configured = config
        .map(|config| config.debug.log_level.trim())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
}

/// The post-mortem log file, when the build and arguments call for one.
fn json_log_file(log_dir: Option<&Path>, debug_build: bool) -> Option<File> {
    if !debug_build {
        return None;
    }
    let dir = log_dir?;
    std::fs::create_dir_all(dir).ok()?;
    File::create(dir.join(LOG_FILE_NAME)).ok()
}
