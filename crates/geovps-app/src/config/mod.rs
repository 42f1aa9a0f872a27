//! Configuration file parsing for GeoVPS
//!
//! Supports `.geovps/config.toml` in a base directory, falling back to the
//! per-user config directory.

pub mod settings;
pub mod types;

pub use settings::{
    config_path, init_config_dir, load_settings, load_settings_from, user_config_path,
};
pub use types::*;
