//! Deploy configuration storage

use serde::{Deserialize, Serialize};

use crate::errors::DeployerError;
use crate::filesys::file::File;

/// Transfer protocol for a deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Sftp,
    Ftp,
}

impl Protocol {
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Sftp => 22,
            Protocol::Ftp => 21,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Sftp => "sftp",
            Protocol::Ftp => "ftp",
        }
    }
}

/// Persisted per-site deployment settings.
///
/// Secret material (password, private key) is never part of this
/// document; it is supplied per attempt or sourced from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub remote_path: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Sftp,
            host: String::new(),
            port: 22,
            user: String::new(),
            remote_path: "/".to_string(),
        }
    }
}

/// Incoming settings for the config-update and connection-test operations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfigPayload {
    #[serde(default)]
    pub protocol: Option<String>,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub remote_path: Option<String>,

    /// One-shot secret for the test and deploy operations. Read by the
    /// credential resolver only; never persisted.
    #[serde(default)]
    pub password: Option<String>,
}

impl From<&DeployConfig> for DeployConfigPayload {
    fn from(config: &DeployConfig) -> Self {
        Self {
            protocol: Some(config.protocol.as_str().to_string()),
            host: config.host.clone(),
            port: Some(config.port),
            user: config.user.clone(),
            remote_path: Some(config.remote_path.clone()),
            password: None,
        }
    }
}

/// Load the deploy config for a site. A missing document is not an error.
pub async fn load_config(file: &File) -> Result<Option<DeployConfig>, DeployerError> {
    if !file.exists().await {
        return Ok(None);
    }
    Ok(Some(file.read_json().await?))
}

/// Persist the deploy config for a site, whole-document replace.
pub async fn save_config(file: &File, config: &DeployConfig) -> Result<(), DeployerError> {
    file.write_json(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::dir::Dir;

    #[tokio::test]
    async fn test_config_round_trip() {
        let dir = Dir::create_temp_dir("deployer-config-test").await.unwrap();
        let file = dir.file("deploy.json");

        let config = DeployConfig {
            protocol: Protocol::Sftp,
            host: "deploy.example.net".to_string(),
            port: 22,
            user: "deploy".to_string(),
            remote_path: "/www".to_string(),
        };
        save_config(&file, &config).await.unwrap();

        let back = load_config(&file).await.unwrap().unwrap();
        assert_eq!(back.protocol, Protocol::Sftp);
        assert_eq!(back.host, "deploy.example.net");
        assert_eq!(back.port, 22);
        assert_eq!(back.user, "deploy");
        assert_eq!(back.remote_path, "/www");

        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_persisted_document_has_no_secret_fields() {
        let dir = Dir::create_temp_dir("deployer-config-test").await.unwrap();
        let file = dir.file("deploy.json");

        save_config(&file, &DeployConfig::default()).await.unwrap();

        let raw = file.read_string().await.unwrap();
        assert!(!raw.contains("password"));
        assert!(!raw.contains("privateKey"));

        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_config_loads_as_none() {
        let dir = Dir::create_temp_dir("deployer-config-test").await.unwrap();
        let loaded = load_config(&dir.file("deploy.json")).await.unwrap();
        assert!(loaded.is_none());
        dir.delete().await.unwrap();
    }
}
