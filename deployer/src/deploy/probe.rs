//! Connectivity probes
//!
//! Minimal pre-flight checks over raw TCP, bounded by a single timeout.
//! The FTP probe walks the login exchange far enough to verify
//! credentials; the SFTP probe only reads the SSH banner, so it
//! confirms reachability without verifying authentication. Neither
//! transfers any data.

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Outcome of a connectivity probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
}

impl ProbeResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Timeout covering a whole probe, connect included.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Client banner sent during the SSH reachability check.
const CLIENT_BANNER: &[u8] = b"SSH-2.0-SitewrightDeploy_1.0\r\n";

/// States of the FTP login exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FtpState {
    Greeting,
    User,
    Pass,
}

/// Next action after feeding one final server reply to the machine.
#[derive(Debug, PartialEq, Eq)]
enum FtpStep {
    Send(String, FtpState),
    Done(bool, String),
}

/// Pure transition function for the FTP login exchange. Drives
/// `greeting -> user -> pass`; any reply outside the expected codes
/// terminates the probe with a failure.
fn ftp_step(state: FtpState, code: u16, line: &str, user: &str, password: &str) -> FtpStep {
    match (state, code) {
        (FtpState::Greeting, 220) => FtpStep::Send(format!("USER {}\r\n", user), FtpState::User),
        (FtpState::User, 331) => FtpStep::Send(format!("PASS {}\r\n", password), FtpState::Pass),
        (FtpState::User, 230) | (FtpState::Pass, 230) => {
            FtpStep::Done(true, "FTP connection and login succeeded.".to_string())
        }
        (FtpState::Pass, _) => FtpStep::Done(false, format!("FTP login refused: {}", line)),
        (_, _) => FtpStep::Done(false, format!("Unexpected FTP response: {}", line)),
    }
}

/// Parse an FTP control line into `(code, is_final)`. Continuation
/// lines (`220-...`) and free-form lines inside a multiline reply
/// yield `None` for the code or `false` for finality and are skipped.
fn parse_reply(line: &str) -> Option<(u16, bool)> {
    let code: u16 = line.get(..3)?.parse().ok()?;
    let is_final = line.as_bytes().get(3) != Some(&b'-');
    Some((code, is_final))
}

/// Probe an FTP server and verify the supplied credentials.
pub async fn test_ftp(host: &str, port: u16, user: &str, password: &str) -> ProbeResult {
    match timeout(PROBE_TIMEOUT, ftp_probe(host, port, user, password)).await {
        Ok(result) => result,
        Err(_) => ProbeResult::fail(format!(
            "FTP probe timed out after {}s.",
            PROBE_TIMEOUT.as_secs()
        )),
    }
}

async fn ftp_probe(host: &str, port: u16, user: &str, password: &str) -> ProbeResult {
    let stream = match TcpStream::connect((host, port)).await {
        Ok(stream) => stream,
        Err(e) => return ProbeResult::fail(format!("Connection failed: {}", e)),
    };
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut state = FtpState::Greeting;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                return ProbeResult::fail("Connection closed before the FTP exchange completed.")
            }
            Err(e) => return ProbeResult::fail(format!("Socket error: {}", e)),
        };
        let line = line.trim_end();
        debug!("FTP <- {}", line);

        let (code, is_final) = match parse_reply(line) {
            Some(reply) => reply,
            // Free-form line inside a multiline reply
            None => continue,
        };
        if !is_final {
            continue;
        }

        match ftp_step(state, code, line, user, password) {
            FtpStep::Send(command, next) => {
                if let Err(e) = write_half.write_all(command.as_bytes()).await {
                    return ProbeResult::fail(format!("Socket error: {}", e));
                }
                state = next;
            }
            FtpStep::Done(true, message) => return ProbeResult::ok(message),
            FtpStep::Done(false, message) => return ProbeResult::fail(message),
        }
    }
}

/// Probe an SSH server for reachability. Authentication is not
/// verified here; it happens during the actual deployment.
pub async fn test_sftp(host: &str, port: u16) -> ProbeResult {
    match timeout(PROBE_TIMEOUT, ssh_banner_probe(host, port)).await {
        Ok(result) => result,
        Err(_) => ProbeResult::fail(format!(
            "SSH probe timed out after {}s.",
            PROBE_TIMEOUT.as_secs()
        )),
    }
}

async fn ssh_banner_probe(host: &str, port: u16) -> ProbeResult {
    let mut stream = match TcpStream::connect((host, port)).await {
        Ok(stream) => stream,
        Err(e) => return ProbeResult::fail(format!("Connection failed: {}", e)),
    };

    if let Err(e) = stream.write_all(CLIENT_BANNER).await {
        return ProbeResult::fail(format!("Socket error: {}", e));
    }

    let mut received = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => return ProbeResult::fail("Connection closed without an SSH banner."),
            Ok(n) => n,
            Err(e) => return ProbeResult::fail(format!("Socket error: {}", e)),
        };
        received.extend_from_slice(&buf[..n]);

        if received.starts_with(b"SSH-") {
            debug!("SSH banner received from {}:{}", host, port);
            return ProbeResult::ok(
                "SSH server reachable. Credentials are verified during deployment.",
            );
        }
        if received.len() >= 4 {
            return ProbeResult::fail("Server did not present an SSH banner.");
        }
    }
}
