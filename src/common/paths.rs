use std::path::PathBuf;

// System locations used outside of dev mode

pub fn system_accounts_dir() -> PathBuf {
    PathBuf::from("/var/lib/watcher/accounts")
}

pub fn system_frames_dir() -> PathBuf {
    PathBuf::from("/var/lib/watcher/frames")
}

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/watcher/watcher.toml")
}

pub fn system_models_dir() -> PathBuf {
    PathBuf::from("/usr/share/watcher/models")
}
