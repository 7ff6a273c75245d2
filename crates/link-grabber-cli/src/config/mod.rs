//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "LINK_GRABBER_SETTINGS";

const SETTINGS_DIR: &str = ".link-grabber";
const SETTINGS_FILE: &str = "settings.json";

/// Resolve the settings file path.
///
/// Order: explicit flag, `LINK_GRABBER_SETTINGS`, `./.link-grabber/settings.json`
/// if it exists, then `~/.link-grabber/settings.json`.
pub fn resolve_settings_path(explicit: Option<&str>) -> PathBuf {
    resolve_with(
        explicit,
        std::env::var(SETTINGS_ENV).ok(),
        Path::new("."),
        dirs::home_dir(),
    )
}

/// [`resolve_settings_path`] with its environment passed in.
pub fn resolve_with(
    explicit: Option<&str>,
    env_path: Option<String>,
    cwd: &Path,
    home: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Some(env_path) = env_path.filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(env_path);
    }

    let cwd_settings = cwd.join(SETTINGS_DIR).join(SETTINGS_FILE);
    if cwd_settings.exists() {
        return cwd_settings;
    }

    home.unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_DIR)
        .join(SETTINGS_FILE)
}
