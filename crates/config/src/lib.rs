// Configuration loading

pub mod grid;
pub mod settings;

pub use grid::{GridConfig, GridStyle, FontStyle};
pub use settings::{ConfigError, Settings};

use std::path::PathBuf;

/// Application directory name under the platform config/state roots.
pub const APP_DIR: &str = "secmatrix";

/// Directory holding `settings.json`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Directory for runtime artifacts (log file).
pub fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}
