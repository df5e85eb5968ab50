use std::env;
use std::fs;
use std::path::PathBuf;

/// Resolved filesystem layout for the process.
///
/// `data_dir` is the root under which every tenant's area lives
/// (`data_dir/users/<tenant>/...`).
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub users_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let users_dir = data_dir.join("users");
        let log_dir = data_dir.join("logs");
        let config_path = data_dir.join("config.toml");
        let secrets_path = data_dir.join("secrets.yaml");

        for dir in [&data_dir, &users_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            users_dir,
            log_dir,
            config_path,
            secrets_path,
        }
    }

    /// Paths rooted at an arbitrary directory. Used by tests and by callers
    /// embedding the pipeline outside the default layout.
    pub fn at(root: PathBuf) -> Self {
        let users_dir = root.join("users");
        let log_dir = root.join("logs");
        let config_path = root.join("config.toml");
        let secrets_path = root.join("secrets.yaml");

        for dir in [&root, &users_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir: root,
            users_dir,
            log_dir,
            config_path,
            secrets_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("WEAVER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("data");
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("Weaver");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("Weaver");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("weaver")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
