use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub log_dir: PathBuf,
    pub config_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let log_dir = env::var("NUTRI_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| project_root.join("logs"));
        let config_path = env::var("NUTRI_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| project_root.join("config.yml"));
        let secrets_path = project_root.join("secrets.yaml");

        let _ = fs::create_dir_all(&log_dir);

        AppPaths {
            project_root,
            log_dir,
            config_path,
            secrets_path,
        }
    }

    /// Paths rooted at an explicit directory, ignoring the environment.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let project_root = root.into();
        AppPaths {
            log_dir: project_root.join("logs"),
            config_path: project_root.join("config.yml"),
            secrets_path: project_root.join("secrets.yaml"),
            project_root,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("NUTRI_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}
