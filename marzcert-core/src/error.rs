//! Error taxonomy for the certificate workflow.
//!
//! Setup and issuance failures abort the flow (`CertError`). Per-directory
//! deployment failures (`DeployError`) and service reload failures
//! (`ServiceReloadError`) are collected and reported instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Fatal errors that stop the current flow
#[derive(Debug, Error)]
pub enum CertError {
    #[error("Insufficient privileges: {0}")]
    Privilege(String),

    #[error("Unsupported environment: {0}")]
    Environment(String),

    #[error("Failed to write DNS credentials {path}: {source}")]
    CredentialWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Certificate issuance failed: {reason}")]
    IssuanceFailed { reason: String },

    #[error("Failed to install certificate client: {0}")]
    ClientInstall(String),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, CertError>;

/// Failure to place the certificate pair into one destination directory
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove existing file {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Certificate source {0} does not exist")]
    MissingSource(PathBuf),

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to set permissions on {path}: {source}")]
    Permissions {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure to restart the dependent panel service
#[derive(Debug, Error)]
pub enum ServiceReloadError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Service restart exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },
}
