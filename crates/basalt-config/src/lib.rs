//! Configuration for the Basalt engine core.
//!
//! Settings live in typed sections with serde defaults, persist to disk as
//! `config.ron`, take clap CLI overrides, and can be re-read at runtime to
//! pick up edits made while the engine is running. Unknown or absent fields
//! never fail a load, so the file survives version skew in both directions.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, FrameConfig, SchedulerConfig};
pub use error::ConfigError;
