//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::errors::DeployerError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, DeployerError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Read file contents as bytes
    pub async fn read_bytes(&self) -> Result<Vec<u8>, DeployerError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;
        Ok(contents)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployerError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Write JSON to file, whole-document replace
    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), DeployerError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_atomic(contents.as_bytes()).await
    }

    /// Atomic write using a temporary file
    pub async fn write_atomic(&self, contents: &[u8]) -> Result<(), DeployerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Delete the file
    pub async fn delete(&self) -> Result<(), DeployerError> {
        if self.exists().await {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::dir::Dir;

    #[test]
    fn test_json_round_trip() {
        tokio_test::block_on(async {
            let dir = Dir::create_temp_dir("deployer-file-test").await.unwrap();
            let file = dir.file("doc.json");

            file.write_json(&vec!["a".to_string(), "b".to_string()])
                .await
                .unwrap();
            let back: Vec<String> = file.read_json().await.unwrap();
            assert_eq!(back, vec!["a".to_string(), "b".to_string()]);

            dir.delete().await.unwrap();
        });
    }

    #[test]
    fn test_missing_file_does_not_exist() {
        tokio_test::block_on(async {
            let file = File::new("/nonexistent/deployer/doc.json");
            assert!(!file.exists().await);
        });
    }
}
