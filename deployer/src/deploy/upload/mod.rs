//! Upload engines, one per protocol

pub mod ftp;
pub mod sftp;
