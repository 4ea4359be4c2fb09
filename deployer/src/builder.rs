//! Build collaborator interface

use async_trait::async_trait;

/// Produces the ready-to-upload output tree for a site.
///
/// The CMS build pipeline implements this; the deployer only observes
/// completion or failure and reads the output from the storage
/// layout's build directory.
#[async_trait]
pub trait SiteBuilder: Send + Sync {
    /// Build the static site for `site`. `clean` forces a full rebuild
    /// instead of an incremental one.
    async fn build(&self, site: &str, clean: bool) -> anyhow::Result<()>;
}
