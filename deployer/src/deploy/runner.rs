//! Deploy orchestration
//!
//! Drives one deploy attempt through validate, build, credential
//! resolution, probe and upload. Every invocation finalizes exactly
//! one attempt record and appends it to the site's deploy log; the
//! append is the terminal action on every code path.

use std::sync::Arc;

use chrono::Utc;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{error, info};

use crate::builder::SiteBuilder;
use crate::deploy::credentials;
use crate::deploy::fsm::{DeployEvent, DeployFsm};
use crate::deploy::probe;
use crate::deploy::upload;
use crate::deploy::validate;
use crate::errors::DeployerError;
use crate::storage::config::{self, DeployConfigPayload, Protocol};
use crate::storage::history::{self, AttemptStatus, DeployAttempt, MAX_ENTRIES};
use crate::storage::layout::StorageLayout;

/// A failed deploy run, carrying the finalized attempt so callers can
/// surface both the error and the accumulated log
#[derive(Debug, Error)]
#[error("{error}")]
pub struct DeployFailed {
    pub attempt: DeployAttempt,
    pub error: DeployerError,
}

/// Options for one deploy invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// One-shot password override for this attempt only
    pub password: Option<String>,

    /// Force a clean rebuild instead of an incremental one
    pub clean_build: bool,
}

/// Deploy orchestrator
pub struct DeployRunner {
    layout: StorageLayout,
    builder: Arc<dyn SiteBuilder>,
}

impl DeployRunner {
    /// Create a new runner
    pub fn new(layout: StorageLayout, builder: Arc<dyn SiteBuilder>) -> Self {
        Self { layout, builder }
    }

    /// Run the full deploy pipeline for a site.
    ///
    /// Resolves with the attempt record on success; on failure the
    /// error carries the finalized attempt. Either way, exactly one
    /// entry is appended to the site's deploy log.
    pub async fn run_deploy(
        &self,
        site: &str,
        options: RunOptions,
    ) -> Result<DeployAttempt, DeployFailed> {
        let started_at = Utc::now();
        let mut logs: Vec<String> = Vec::new();
        let mut fsm = DeployFsm::new();

        info!("Starting deploy for {}", site);
        let result = self.run_pipeline(site, &options, &mut fsm, &mut logs).await;

        let finished_at = Utc::now();
        let (status, message) = match &result {
            Ok(message) => (AttemptStatus::Success, message.clone()),
            Err(e) => {
                let message = e.to_string();
                logs.push(message.clone());
                error!(
                    "Deploy failed for {} during {}: {}",
                    site,
                    fsm.state().label(),
                    message
                );
                let _ = fsm.process(DeployEvent::Fail(message.clone()));
                (AttemptStatus::Error, message)
            }
        };

        let attempt = DeployAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
            status,
            message,
            logs,
        };

        let log_file = self.layout.deploy_log_file(site);
        if let Err(e) = history::append(&log_file, attempt.clone(), MAX_ENTRIES).await {
            error!("Could not append deploy log for {}: {}", site, e);
        }

        match result {
            Ok(_) => {
                info!("Deploy succeeded for {}", site);
                Ok(attempt)
            }
            Err(err) => Err(DeployFailed {
                attempt,
                error: err,
            }),
        }
    }

    async fn run_pipeline(
        &self,
        site: &str,
        options: &RunOptions,
        fsm: &mut DeployFsm,
        logs: &mut Vec<String>,
    ) -> Result<String, DeployerError> {
        fsm.process(DeployEvent::Validate)
            .map_err(DeployerError::Internal)?;
        let stored = config::load_config(&self.layout.deploy_config_file(site))
            .await?
            .ok_or_else(|| {
                DeployerError::ConfigError(format!("No deployment configuration for site {}", site))
            })?;
        // The same checks run on config-save and here, so a config that
        // became unsafe (e.g. the FTP flag was turned off) fails early.
        let config = validate::validate(&DeployConfigPayload::from(&stored), validate::ftp_allowed())
            .map_err(|e| DeployerError::ValidationError(e.to_string()))?;
        logs.push(format!(
            "Configuration validated: {}://{}:{}{}",
            config.protocol.as_str(),
            config.host,
            config.port,
            config.remote_path
        ));

        fsm.process(DeployEvent::Build)
            .map_err(DeployerError::Internal)?;
        logs.push("Building site...".to_string());
        self.builder
            .build(site, options.clean_build)
            .await
            .map_err(|e| DeployerError::BuildError(e.to_string()))?;
        logs.push("Site build complete.".to_string());

        let creds = credentials::resolve(site, options.password.as_deref())?;
        match config.protocol {
            Protocol::Ftp if !creds.has_password() => {
                return Err(DeployerError::CredentialError(
                    "No password available for FTP deployment.".to_string(),
                ));
            }
            Protocol::Sftp if !creds.has_password() && !creds.has_private_key() => {
                return Err(DeployerError::CredentialError(
                    "No password or private key available for SFTP deployment.".to_string(),
                ));
            }
            _ => {}
        }

        fsm.process(DeployEvent::Probe)
            .map_err(DeployerError::Internal)?;
        logs.push(format!("Probing {}:{}...", config.host, config.port));
        let probe_result = match config.protocol {
            Protocol::Ftp => {
                probe::test_ftp(
                    &config.host,
                    config.port,
                    &config.user,
                    creds.password.expose_secret(),
                )
                .await
            }
            Protocol::Sftp => probe::test_sftp(&config.host, config.port).await,
        };
        if !probe_result.success {
            return Err(DeployerError::ConnectivityError(probe_result.message));
        }
        logs.push(probe_result.message);

        fsm.process(DeployEvent::Upload)
            .map_err(DeployerError::Internal)?;
        let build_dir = self.layout.build_dir(site);
        let count = match config.protocol {
            Protocol::Sftp => {
                upload::sftp::upload_via_sftp(&build_dir, &config, &creds, logs).await?
            }
            Protocol::Ftp => upload::ftp::upload_via_ftp(&build_dir, &config, &creds, logs).await?,
        };

        fsm.process(DeployEvent::Finish)
            .map_err(DeployerError::Internal)?;
        Ok(format!(
            "Deployed {} files to {}:{}{}",
            count, config.host, config.port, config.remote_path
        ))
    }
}
