//! Deployment service operations
//!
//! The transport-independent surface the HTTP layer exposes. Secrets
//! never leave this boundary: callers only learn whether a password is
//! configured, never its value.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::info;

use crate::builder::SiteBuilder;
use crate::deploy::credentials;
use crate::deploy::probe::{self, ProbeResult};
use crate::deploy::runner::{DeployFailed, DeployRunner, RunOptions};
use crate::deploy::validate;
use crate::errors::DeployerError;
use crate::storage::config::{self, DeployConfig, DeployConfigPayload, Protocol};
use crate::storage::history::{self, DeployAttempt};
use crate::storage::layout::StorageLayout;

/// Deploy settings as returned to callers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfigView {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub remote_path: String,
    pub has_password: bool,
}

impl DeployConfigView {
    fn from_config(config: DeployConfig, site: &str) -> Self {
        Self {
            protocol: config.protocol,
            host: config.host,
            port: config.port,
            user: config.user,
            remote_path: config.remote_path,
            has_password: credentials::env_password_set(site),
        }
    }
}

/// Deployment service
pub struct DeployService {
    layout: StorageLayout,
    runner: DeployRunner,
}

impl DeployService {
    /// Create a new service over a storage layout and build collaborator
    pub fn new(layout: StorageLayout, builder: Arc<dyn SiteBuilder>) -> Self {
        let runner = DeployRunner::new(layout.clone(), builder);
        Self { layout, runner }
    }

    /// Get the deploy configuration for a site, or defaults when none
    /// has been saved yet
    pub async fn get_deploy_config(&self, site: &str) -> Result<DeployConfigView, DeployerError> {
        let config = config::load_config(&self.layout.deploy_config_file(site))
            .await?
            .unwrap_or_default();
        Ok(DeployConfigView::from_config(config, site))
    }

    /// Validate and persist the deploy configuration for a site.
    /// Secret fields of the payload are never written to the store.
    pub async fn set_deploy_config(
        &self,
        site: &str,
        payload: DeployConfigPayload,
    ) -> Result<DeployConfigView, DeployerError> {
        let config = validate::validate(&payload, validate::ftp_allowed())
            .map_err(|e| DeployerError::ValidationError(e.to_string()))?;
        config::save_config(&self.layout.deploy_config_file(site), &config).await?;
        info!("Deploy config updated for {}", site);
        Ok(DeployConfigView::from_config(config, site))
    }

    /// Pre-flight connection test against the supplied (possibly not
    /// yet saved) settings. Always resolves to a result; validation
    /// failures surface as a negative result, not an error.
    pub async fn test_deploy_connection(
        &self,
        site: &str,
        payload: DeployConfigPayload,
    ) -> ProbeResult {
        let config = match validate::validate(&payload, validate::ftp_allowed()) {
            Ok(config) => config,
            Err(e) => return ProbeResult::fail(e.to_string()),
        };

        match config.protocol {
            Protocol::Ftp => {
                let password =
                    credentials::resolve_password(site, payload.password.as_deref(), None);
                if password.expose_secret().is_empty() {
                    return ProbeResult::fail("A password is required to test an FTP connection.");
                }
                probe::test_ftp(
                    &config.host,
                    config.port,
                    &config.user,
                    password.expose_secret(),
                )
                .await
            }
            Protocol::Sftp => probe::test_sftp(&config.host, config.port).await,
        }
    }

    /// Run a full deploy for a site
    pub async fn run_deploy(
        &self,
        site: &str,
        options: RunOptions,
    ) -> Result<DeployAttempt, DeployFailed> {
        self.runner.run_deploy(site, options).await
    }

    /// Read the attempt history for a site, newest first
    pub async fn get_deploy_log(&self, site: &str) -> Result<Vec<DeployAttempt>, DeployerError> {
        history::read(&self.layout.deploy_log_file(site)).await
    }
}
