//! FTP upload engine
//!
//! Plaintext FTP with a blocking client, driven from a blocking task.
//! Logging is coarser than the SFTP engine's per-file lines: one pair
//! of progress lines covers the whole tree.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;

use secrecy::ExposeSecret;
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tokio::task;
use tracing::{debug, info};

use crate::deploy::credentials::Credentials;
use crate::errors::DeployerError;
use crate::filesys::dir::Dir;
use crate::storage::config::DeployConfig;

/// Upload the local build tree to the configured remote path over FTP.
///
/// Returns the number of files transferred.
pub async fn upload_via_ftp(
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
        "Starting FTP upload of {} files to {}:{}",
        files.len(),
        config.host,
        config.port
    );
    log_lines.push(format!("FTP upload of {} files in progress...", files.len()));

    let host = config.host.clone();
    let port = config.port;
    let user = config.user.clone();
    let password = credentials.password.expose_secret().to_string();
    let remote_path = config.remote_path.clone();

    let count = task::spawn_blocking(move || {
        ftp_upload_tree(&host, port, &user, &password, &remote_path, files)
    })
    .await
    .map_err(|e| DeployerError::Internal(format!("FTP upload task failed: {}", e)))??;

    log_lines.push("FTP upload complete.".to_string());
    info!("FTP upload complete: {} files", count);
    Ok(count)
}

fn ftp_upload_tree(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    remote_path: &str,
    files: Vec<(PathBuf, String)>,
) -> Result<usize, DeployerError> {
    let mut ftp = FtpStream::connect(format!("{}:{}", host, port))
        .map_err(|e| DeployerError::UploadError(format!("FTP connection failed: {}", e)))?;
    ftp.login(user, password)
        .map_err(|e| DeployerError::UploadError(format!("FTP login failed: {}", e)))?;
    ftp.transfer_type(FileType::Binary)
        .map_err(|e| DeployerError::UploadError(format!("FTP transfer setup failed: {}", e)))?;

    let base = remote_path.trim_end_matches('/').to_string();
    let mut known_dirs: HashSet<String> = HashSet::new();
    ensure_remote_dirs(&mut ftp, remote_path, &mut known_dirs);

    for (abs, rel) in &files {
        let remote = format!("{}/{}", base, rel);
        if let Some(idx) = remote.rfind('/') {
            ensure_remote_dirs(&mut ftp, &remote[..idx], &mut known_dirs);
        }

        let data = std::fs::read(abs)?;
        ftp.put_file(remote.as_str(), &mut Cursor::new(data))
            .map_err(|e| DeployerError::UploadError(format!("Transfer of {} failed: {}", rel, e)))?;
        debug!("Uploaded {} -> {}", rel, remote);
    }

    ftp.quit().ok();
    Ok(files.len())
}

/// Idempotent recursive mkdir. Failures (typically "already exists")
/// are ignored; a directory that truly could not be created surfaces
/// on the upload that follows.
fn ensure_remote_dirs(ftp: &mut FtpStream, path: &str, known_dirs: &mut HashSet<String>) {
    let mut prefix = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        prefix.push('/');
        prefix.push_str(part);
        if known_dirs.contains(&prefix) {
            continue;
        }
        if let Err(e) = ftp.mkdir(prefix.as_str()) {
            debug!("mkdir {} returned {}", prefix, e);
        }
        known_dirs.insert(prefix.clone());
    }
}
