//! SFTP upload engine
//!
//! Connects with the resolved private key when one exists, otherwise
//! with the password, then walks the build output tree and transfers
//! it file by file, creating remote directories on the way.

use std::collections::HashSet;
use std::sync::Arc;

use russh::client;
use russh::keys::ssh_key;
use russh::keys::{decode_secret_key, PrivateKeyWithHashAlg};
use russh_sftp::client::SftpSession;
use secrecy::ExposeSecret;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::deploy::credentials::Credentials;
use crate::errors::DeployerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::storage::config::DeployConfig;

/// Host keys are accepted without verification: the CMS keeps no
/// known-hosts state, and the pre-flight probe only checked
/// reachability.
struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Upload the local build tree to the configured remote path over SFTP.
///
/// Appends one log line per transferred file. Returns the number of
/// files transferred.
pub async fn upload_via_sftp(
    local_root: &Dir,
    config: &DeployConfig,
    credentials: &Credentials,
    log_lines: &mut Vec<String>,
) -> Result<usize, DeployerError> {
    if !local_root.exists().await {
        return Err(DeployerError::UploadError(format!(
            "Build output directory {} does not exist",
            local_root.path().display()
        )));
    }

    let files = local_root.walk_files().await?;
    info!(
        "Starting SFTP upload of {} files to {}:{}",
        files.len(),
        config.host,
        config.port
    );

    let ssh_config = Arc::new(client::Config::default());
    let mut session = client::connect(
        ssh_config,
        (config.host.as_str(), config.port),
        AcceptingHandler,
    )
    .await
    .map_err(|e| DeployerError::UploadError(format!("SSH connection failed: {}", e)))?;

    let auth_result = if let Some(key) = &credentials.private_key {
        let pair = decode_secret_key(
            key.pem.expose_secret(),
            key.passphrase.as_ref().map(|p| p.expose_secret()),
        )
        .map_err(|e| DeployerError::CredentialError(format!("Could not read private key: {}", e)))?;
        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .map_err(|e| DeployerError::UploadError(format!("SSH negotiation failed: {}", e)))?
            .flatten();
        session
            .authenticate_publickey(
                &config.user,
                PrivateKeyWithHashAlg::new(Arc::new(pair), hash_alg),
            )
            .await
            .map_err(|e| DeployerError::UploadError(format!("SSH authentication failed: {}", e)))?
    } else {
        session
            .authenticate_password(&config.user, credentials.password.expose_secret())
            .await
            .map_err(|e| DeployerError::UploadError(format!("SSH authentication failed: {}", e)))?
    };
    if !matches!(auth_result, client::AuthResult::Success) {
        return Err(DeployerError::UploadError(
            "SSH authentication was rejected.".to_string(),
        ));
    }

    let channel = session
        .channel_open_session()
        .await
        .map_err(|e| DeployerError::UploadError(format!("SSH channel failed: {}", e)))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| DeployerError::UploadError(format!("SFTP subsystem failed: {}", e)))?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| DeployerError::UploadError(format!("SFTP session failed: {}", e)))?;

    let base = config.remote_path.trim_end_matches('/').to_string();
    let mut known_dirs: HashSet<String> = HashSet::new();
    ensure_remote_dirs(&sftp, &config.remote_path, &mut known_dirs).await;

    for (abs, rel) in &files {
        let remote = format!("{}/{}", base, rel);
        if let Some(idx) = remote.rfind('/') {
            ensure_remote_dirs(&sftp, &remote[..idx], &mut known_dirs).await;
        }

        let data = File::new(abs).read_bytes().await?;
        let mut remote_file = sftp
            .create(remote.as_str())
            .await
            .map_err(|e| DeployerError::UploadError(format!("Could not create {}: {}", remote, e)))?;
        remote_file
            .write_all(&data)
            .await
            .map_err(|e| DeployerError::UploadError(format!("Transfer of {} failed: {}", rel, e)))?;
        remote_file
            .shutdown()
            .await
            .map_err(|e| DeployerError::UploadError(format!("Transfer of {} failed: {}", rel, e)))?;

        debug!("Uploaded {} -> {}", rel, remote);
        log_lines.push(format!("Uploaded {}", rel));
    }

    session
        .disconnect(russh::Disconnect::ByApplication, "deploy complete", "en")
        .await
        .ok();

    info!("SFTP upload complete: {} files", files.len());
    Ok(files.len())
}

/// Idempotent recursive mkdir. Errors are ignored here; a directory
/// that truly could not be created surfaces on the file create that
/// follows.
async fn ensure_remote_dirs(sftp: &SftpSession, path: &str, known_dirs: &mut HashSet<String>) {
    let mut prefix = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        prefix.push('/');
        prefix.push_str(part);
        if known_dirs.contains(&prefix) {
            continue;
        }
        if sftp.metadata(prefix.as_str()).await.is_err() {
            if let Err(e) = sftp.create_dir(prefix.as_str()).await {
                debug!("mkdir {} returned {}", prefix, e);
            }
        }
        known_dirs.insert(prefix.clone());
    }
}
