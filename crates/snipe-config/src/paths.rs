use directories::ProjectDirs;
use std::path::PathBuf;

pub const APP_NAME: &str = "seat-sniper";
const CONFIG_FILE: &str = "snipe.toml";

/// Resolve the config file: an explicit path wins, then `./snipe.toml`,
/// then the per-user config directory.
pub fn config_file_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .unwrap_or(local)
}

/// Per-user state directory (logs, encrypted secret store).
pub fn state_dir() -> PathBuf {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| {
            dirs.state_dir()
                .unwrap_or_else(|| dirs.data_local_dir())
                .to_path_buf()
        })
        .unwrap_or_else(|| PathBuf::from(".seat-sniper"))
}
