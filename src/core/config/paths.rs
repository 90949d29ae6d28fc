use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::StorageSettings;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub index_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new(project_root: PathBuf, storage: &StorageSettings) -> Self {
        let index_dir = absolutize(&project_root, &storage.index_dir);
        let data_dir = absolutize(&project_root, &storage.data_dir);
        let log_dir = absolutize(&project_root, &storage.log_dir);

        for dir in [&index_dir, &log_dir] {
            if let Err(err) = fs::create_dir_all(dir) {
                tracing::warn!("Failed to create {}: {}", dir.display(), err);
            }
        }

        AppPaths {
            project_root,
            index_dir,
            data_dir,
            log_dir,
        }
    }

    pub fn index_db_path(&self) -> PathBuf {
        self.index_dir.join("index.db")
    }
}

pub fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("DEPTQA_ROOT") {
        if !root.trim().is_empty() {
            return PathBuf::from(root);
        }
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}

fn absolutize(root: &Path, candidate: &Path) -> PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_storage_paths_resolve_under_project_root() {
        let root = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(root.path().to_path_buf(), &StorageSettings::default());

        assert_eq!(paths.index_dir, root.path().join("vector_index"));
        assert_eq!(paths.index_db_path(), root.path().join("vector_index/index.db"));
        assert!(paths.index_dir.exists());
        assert!(paths.log_dir.exists());
    }

    #[test]
    fn absolute_storage_paths_are_kept() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let storage = StorageSettings {
            index_dir: elsewhere.path().join("idx"),
            ..StorageSettings::default()
        };

        let paths = AppPaths::new(root.path().to_path_buf(), &storage);
        assert_eq!(paths.index_dir, elsewhere.path().join("idx"));
    }
}
