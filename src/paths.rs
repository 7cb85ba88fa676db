use std::path::PathBuf;

use crate::constants::{DEFAULTS_FILE_NAME, STATE_FILE_NAME};

pub fn config_root_dir() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "nhp", "nhp-host") {
        dirs.config_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

pub fn data_dir() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "nhp", "nhp-host") {
        dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

pub fn config_path() -> PathBuf {
    let dir = config_root_dir();
    let _ = std::fs::create_dir_all(&dir);
    dir.join("config.json")
}

pub fn state_path() -> PathBuf {
    let dir = data_dir();
    let _ = std::fs::create_dir_all(&dir);
    dir.join(STATE_FILE_NAME)
}

pub fn defaults_path() -> PathBuf {
    let dir = config_root_dir();
    let _ = std::fs::create_dir_all(&dir);
    dir.join(DEFAULTS_FILE_NAME)
}
