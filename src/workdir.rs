use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing::debug;
use walkdir::WalkDir;

use crate::{
    collaborators::{LoadPredicate, RepositoryLoader},
    source::SourceSnapshot,
};

/// Loads files from a checkout on disk.
///
/// The branch is ignored: the checkout is taken as it is.
#[derive(Default)]
pub struct WorkdirLoader;

impl RepositoryLoader for WorkdirLoader {
    fn load_files(
        &self,
        repository: &str,
        branch: &str,
        predicate: &LoadPredicate,
    ) -> Result<Vec<SourceSnapshot>> {
        let root = Path::new(repository);
        if !root.is_dir() {
            anyhow::bail!("`{repository}` is not a directory");
        }
        debug!("loading {} as checked out, ignoring branch {branch}", root.display());

        let mut snapshots = Vec::new();
        let entries = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() > 0
                    && entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| predicate.excluded_dirs.iter().any(|dir| dir == name)))
            });
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to walk `{repository}`"))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if !predicate.accepts(relative) {
                continue;
            }
            match fs::read_to_string(entry.path()) {
                Ok(text) => snapshots.push(SourceSnapshot::new(relative, text)),
                Err(error) => debug!("skipping {}: {error}", relative.display()),
            }
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn loads_accepted_files_with_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("app/__pycache__")).expect("mkdir");
        fs::write(dir.path().join("app/main.py"), "def main():\n    pass\n").expect("write");
        fs::write(dir.path().join("app/__pycache__/main.py"), "stale").expect("write");
        fs::write(dir.path().join("README.md"), "# readme").expect("write");

        let predicate = LoadPredicate::new(&["py"], &["__pycache__".to_string()]);
        let snapshots = WorkdirLoader
            .load_files(&dir.path().to_string_lossy(), "main", &predicate)
            .expect("loads");
        let paths: Vec<PathBuf> = snapshots.iter().map(|s| s.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("app/main.py")]);
        assert_eq!(snapshots[0].line_count, 2);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let predicate = LoadPredicate::new(&["py"], &[]);
        assert!(WorkdirLoader
            .load_files("/definitely/not/here", "main", &predicate)
            .is_err());
    }
}
