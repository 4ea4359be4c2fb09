//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::DeployerError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), DeployerError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), DeployerError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> crate::filesys::file::File {
        crate::filesys::file::File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Recursively collect all files under this directory.
    ///
    /// Returns `(absolute path, relative path)` pairs. Relative paths use
    /// `/` separators so they can be joined onto remote paths directly.
    /// Entries are sorted by relative path for a stable transfer order.
    pub async fn walk_files(&self) -> Result<Vec<(PathBuf, String)>, DeployerError> {
        let mut files = Vec::new();
        let mut pending = vec![(self.path.clone(), String::new())];

        while let Some((abs, rel)) = pending.pop() {
            let mut entries = fs::read_dir(&abs).await?;

            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child_rel = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };

                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), child_rel));
                } else if file_type.is_file() {
                    files.push((entry.path(), child_rel));
                }
            }
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }

    /// Create a temporary directory
    pub async fn create_temp_dir(prefix: &str) -> Result<Dir, DeployerError> {
        let temp_dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        fs::create_dir_all(&temp_dir).await?;
        Ok(Dir::new(temp_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_walk_files_recurses_and_sorts() {
        let dir = Dir::create_temp_dir("deployer-dir-test").await.unwrap();

        dir.file("index.html").write_atomic(b"<html>").await.unwrap();
        dir.subdir("assets").create().await.unwrap();
        dir.file("assets/site.css").write_atomic(b"body{}").await.unwrap();
        dir.subdir("assets/img").create().await.unwrap();
        dir.file("assets/img/logo.svg").write_atomic(b"<svg>").await.unwrap();

        let files = dir.walk_files().await.unwrap();
        let rels: Vec<&str> = files.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(rels, vec!["assets/img/logo.svg", "assets/site.css", "index.html"]);

        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_walk_files_missing_dir_is_error() {
        let dir = Dir::new("/nonexistent/deployer/build");
        assert!(dir.walk_files().await.is_err());
    }
}
