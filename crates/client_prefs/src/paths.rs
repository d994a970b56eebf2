use std::path::{Path, PathBuf};

pub const PREFS_DIR: &str = ".relay_chat";
pub const PREFS_FILE: &str = "prefs.json";

#[must_use]
pub fn prefs_root(home: &Path) -> PathBuf {
    home.join(PREFS_DIR)
}

#[must_use]
pub fn prefs_file(home: &Path) -> PathBuf {
    prefs_root(home).join(PREFS_FILE)
}
