//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Storage layout for per-site deployment documents
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn site_dir(&self, site: &str) -> Dir {
        Dir::new(self.base_dir.join("sites").join(site))
    }

    /// Get the deploy config document for a site
    pub fn deploy_config_file(&self, site: &str) -> File {
        self.site_dir(site).file("deploy.json")
    }

    /// Get the deploy attempt history document for a site
    pub fn deploy_log_file(&self, site: &str) -> File {
        self.site_dir(site).file("deploy-log.json")
    }

    /// Get the build output directory for a site.
    ///
    /// The build pipeline writes here; the upload engines read from it.
    pub fn build_dir(&self, site: &str) -> Dir {
        Dir::new(self.base_dir.join("builds").join(site))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::DeployerError> {
        Dir::new(self.base_dir.join("sites")).create().await?;
        Dir::new(self.base_dir.join("builds")).create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // Use /var/lib/sitewright on Linux, or user home directory elsewhere
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/var/lib/sitewright");

        #[cfg(not(target_os = "linux"))]
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitewright");

        Self::new(base_dir)
    }
}

// Minimal home-dir lookup for non-Linux platforms
#[cfg(not(target_os = "linux"))]
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
