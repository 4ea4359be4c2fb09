//! Deploy target validation
//!
//! Pure checks that run identically on config-save and pre-flight test
//! paths. Rejecting private, loopback and otherwise internal targets
//! keeps the deployer from being used as a probe against the host's
//! own network. Hostnames that are not IP literals pass; DNS-based
//! resolution to an internal address is a documented residual risk.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};
use thiserror::Error;

use crate::storage::config::{DeployConfig, DeployConfigPayload, Protocol};

/// Ports a deployment target may use. Deliberately narrow: the CMS only
/// ever deploys over the two standard transfer ports.
const ALLOWED_PORTS: &[u16] = &[21, 22];

/// IPv4 ranges a deployment target must not fall into.
const BLOCKED_V4: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "224.0.0.0/4",
    "240.0.0.0/4",
];

/// IPv6 ranges a deployment target must not fall into.
const BLOCKED_V6: &[&str] = &["::/128", "::1/128", "fc00::/7", "fe80::/10", "ff00::/8"];

/// Human-readable reason a configuration was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RejectedConfig(pub String);

impl RejectedConfig {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Process-wide flag gating FTP deployment support
pub fn ftp_allowed() -> bool {
    std::env::var("ALLOW_FTP")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Validate and normalize a deployment configuration.
///
/// Returns the normalized config (protocol default applied, port
/// defaulted by protocol, remote path rooted at `/`) or a descriptive
/// user-facing message. Pure and side-effect free.
pub fn validate(
    payload: &DeployConfigPayload,
    allow_ftp: bool,
) -> Result<DeployConfig, RejectedConfig> {
    let protocol = match payload.protocol.as_deref().map(str::trim) {
        None | Some("") | Some("sftp") => Protocol::Sftp,
        Some("ftp") => {
            if !allow_ftp {
                return Err(RejectedConfig::new("FTP deployment is disabled on this server."));
            }
            Protocol::Ftp
        }
        Some(other) => {
            return Err(RejectedConfig::new(format!("Unsupported protocol: {}.", other)));
        }
    };

    let host = payload.host.trim();
    if host.is_empty() {
        return Err(RejectedConfig::new("Host is required."));
    }
    if host.contains(char::is_whitespace) || host.contains("://") {
        return Err(RejectedConfig::new("Host is not valid."));
    }
    match host.parse::<IpAddr>() {
        Ok(ip) => {
            if is_blocked_ip(ip) {
                return Err(RejectedConfig::new("Host not allowed."));
            }
        }
        Err(_) => {
            let well_formed = host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
            if !well_formed {
                return Err(RejectedConfig::new("Host is not valid."));
            }
        }
    }

    let port = payload.port.unwrap_or_else(|| protocol.default_port());
    if !ALLOWED_PORTS.contains(&port) {
        return Err(RejectedConfig::new("Port not allowed."));
    }

    let remote_path = match payload.remote_path.as_deref().map(str::trim) {
        None | Some("") => return Err(RejectedConfig::new("Remote path is required.")),
        Some(path) if path.starts_with('/') => path.to_string(),
        Some(path) => format!("/{}", path),
    };

    Ok(DeployConfig {
        protocol,
        host: host.to_string(),
        port,
        user: payload.user.trim().to_string(),
        remote_path,
    })
}

/// Classify a literal IP as an internal/reserved deploy target.
fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_blocked_v4(v4),
            None => is_blocked_v6(v6),
        },
    }
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    BLOCKED_V4.iter().any(|cidr| {
        cidr.parse::<Ipv4Net>()
            .map(|net| net.contains(&ip))
            .unwrap_or(false)
    })
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    BLOCKED_V6.iter().any(|cidr| {
        cidr.parse::<Ipv6Net>()
            .map(|net| net.contains(&ip))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(host: &str) -> DeployConfigPayload {
        DeployConfigPayload {
            protocol: Some("sftp".to_string()),
            host: host.to_string(),
            port: Some(22),
            user: "deploy".to_string(),
            remote_path: Some("/www".to_string()),
            password: None,
        }
    }

    #[test]
    fn test_ftp_requires_feature_flag() {
        let mut p = payload("deploy.example.net");
        p.protocol = Some("ftp".to_string());
        p.port = Some(21);

        assert!(validate(&p, false).is_err());

        let config = validate(&p, true).unwrap();
        assert_eq!(config.protocol, Protocol::Ftp);
        assert_eq!(config.port, 21);
    }

    #[test]
    fn test_protocol_defaults_to_sftp() {
        let mut p = payload("deploy.example.net");
        p.protocol = None;
        p.port = None;

        let config = validate(&p, false).unwrap();
        assert_eq!(config.protocol, Protocol::Sftp);
        assert_eq!(config.port, 22);
    }

    #[test]
    fn test_unknown_protocol_is_rejected() {
        let mut p = payload("deploy.example.net");
        p.protocol = Some("scp".to_string());
        assert!(validate(&p, true).is_err());
    }

    #[test]
    fn test_port_whitelist() {
        for port in [20, 23, 80, 2222, 8080] {
            let mut p = payload("deploy.example.net");
            p.port = Some(port);
            let err = validate(&p, false).unwrap_err();
            assert_eq!(err.0, "Port not allowed.");
        }
    }

    #[test]
    fn test_blocked_ipv4_literals() {
        for host in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "172.31.255.254",
            "192.168.1.10",
            "169.254.0.5",
            "100.64.1.1",
            "0.0.0.0",
            "224.0.0.1",
            "255.255.255.255",
        ] {
            let err = validate(&payload(host), false).unwrap_err();
            assert_eq!(err.0, "Host not allowed.", "{} should be blocked", host);
        }
    }

    #[test]
    fn test_blocked_ipv6_literals() {
        for host in ["::1", "::", "fe80::1", "fc00::1", "fd12:3456::1", "ff02::1", "::ffff:127.0.0.1", "::ffff:192.168.0.1"] {
            let err = validate(&payload(host), false).unwrap_err();
            assert_eq!(err.0, "Host not allowed.", "{} should be blocked", host);
        }
    }

    #[test]
    fn test_public_targets_pass() {
        for host in ["deploy.example.net", "198.51.100.7", "93.184.216.34", "2001:4860:4860::8888"] {
            assert!(validate(&payload(host), false).is_ok(), "{} should pass", host);
        }
    }

    #[test]
    fn test_malformed_hosts_are_rejected() {
        for host in ["", "exam ple.com", "sftp://example.com", "host_name", "a/b"] {
            assert!(validate(&payload(host), false).is_err(), "{:?} should fail", host);
        }
    }

    #[test]
    fn test_remote_path_is_rooted() {
        let mut p = payload("198.51.100.7");
        p.remote_path = Some("www".to_string());

        let config = validate(&p, false).unwrap();
        assert_eq!(config.protocol, Protocol::Sftp);
        assert_eq!(config.port, 22);
        assert_eq!(config.remote_path, "/www");
    }

    #[test]
    fn test_empty_remote_path_fails() {
        let mut p = payload("198.51.100.7");
        p.remote_path = Some("  ".to_string());
        assert!(validate(&p, false).is_err());

        p.remote_path = None;
        assert!(validate(&p, false).is_err());
    }

    #[test]
    fn test_loopback_message() {
        let err = validate(&payload("127.0.0.1"), false).unwrap_err();
        assert_eq!(err.to_string(), "Host not allowed.");
    }
}
