//! Settings parser for .geovps/config.toml

use std::path::{Path, PathBuf};

use geovps_core::prelude::*;

use super::types::Settings;

const GEOVPS_DIR: &str = ".geovps";
const CONFIG_FILENAME: &str = "config.toml";

/// Path of the project-level config file under `base`
pub fn config_path(base: &Path) -> PathBuf {
    base.join(GEOVPS_DIR).join(CONFIG_FILENAME)
}

/// Path of the per-user config file, if the platform has a config dir
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("geovps").join(CONFIG_FILENAME))
}

/// Load settings from `<base>/.geovps/config.toml`.
///
/// Falls back to the per-user config file, then to defaults. A file that
/// cannot be read or parsed is logged and ignored.
pub fn load_settings(base: &Path) -> Settings {
    let project = config_path(base);
    if project.exists() {
        return read_or_default(&project);
    }

    if let Some(user) = user_config_path().filter(|p| p.exists()) {
        return read_or_default(&user);
    }

    debug!("No config file at {:?}, using defaults", project);
    Settings::default()
}

fn read_or_default(path: &Path) -> Settings {
    match load_settings_from(path) {
        Ok(settings) => {
            debug!("Loaded settings from {:?}", path);
            settings
        }
        Err(e) => {
            warn!("Ignoring {:?}, using defaults: {}", path, e);
            Settings::default()
        }
    }
}

/// Strict loader: errors instead of falling back
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<Settings>(&content)
        .with_context(|| format!("Invalid config in {}", path.display()))
}

/// Create `.geovps/config.toml` with commented defaults.
///
/// An existing file is left untouched. Returns the config file path.
pub fn init_config_dir(base: &Path) -> Result<PathBuf> {
    let geovps_dir = base.join(GEOVPS_DIR);

    if !geovps_dir.exists() {
        std::fs::create_dir_all(&geovps_dir)
            .map_err(|e| Error::config(format!("Failed to create .geovps dir: {}", e)))?;
    }

    let path = geovps_dir.join(CONFIG_FILENAME);
    if !path.exists() {
        std::fs::write(&path, DEFAULT_CONFIG)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", path);
    }

    Ok(path)
}

const DEFAULT_CONFIG: &str = r#"# GeoVPS Configuration

[polling]
interval_ms = 100          # Engine update cadence while tracking (min 10)

[session]
camera = "back"            # back | front
geospatial_mode = "enabled"
request_install = true     # Prompt to install the engine when missing

[events]
diagnostics = false        # Publish per-frame diagnostic events
channel_capacity = 64

[simulation]
supported = true
installed = true
frames_to_localize = 20
start_latitude = 37.422
start_longitude = -122.0841
start_altitude = 10.0
heading_degrees = 0.0
step_meters = 0.05
coverage_radius_km = 25.0
# camera_fail_after = 200  # Simulate losing the camera after N frames
availability_latency_ms = 50
"#;
