//! Configuration file discovery
//!
//! Finds the runner configuration file in the standard locations.

use std::path::{Path, PathBuf};

/// Configuration file names looked up in the working directory, in order
pub const CONFIG_FILE_NAMES: &[&str] = &["stresscheck.yaml", "stresscheck.yml", ".stresscheck.yaml"];

/// First existing configuration file, working directory before the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    find_in(Path::new("."), dirs::config_dir().as_deref())
}

fn find_in(working_dir: &Path, config_dir: Option<&Path>) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| working_dir.join(name))
        .chain(config_dir.map(|dir| dir.join("stresscheck").join("config.yaml")))
        .find(|path| path.exists())
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
