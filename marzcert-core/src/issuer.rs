//! certbot-backed certificate issuance.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{CertError, Result};
use crate::process::CommandRunner;
use crate::request::{CertificateRequest, IssueOptions};

pub const LIVE_CERT_FILENAME: &str = "fullchain.pem";
pub const LIVE_KEY_FILENAME: &str = "privkey.pem";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub primary_domain: String,
    pub cert_source_path: PathBuf,
    pub key_source_path: PathBuf,
}

impl IssuedCertificate {
    /// Source paths under certbot's live directory for `primary_domain`.
    pub fn in_live_dir(live_dir: &Path, primary_domain: &str) -> Self {
        let lineage = live_dir.join(primary_domain);
        Self {
            primary_domain: primary_domain.to_string(),
            cert_source_path: lineage.join(LIVE_CERT_FILENAME),
            key_source_path: lineage.join(LIVE_KEY_FILENAME),
        }
    }

    pub fn sources_exist(&self) -> bool {
        self.cert_source_path.is_file() && self.key_source_path.is_file()
    }
}

pub trait CertificateIssuer {
    fn issue(&self, request: &CertificateRequest) -> Result<IssuedCertificate>;
}

pub struct CertbotIssuer<'a> {
    runner: &'a dyn CommandRunner,
    certbot_bin: String,
    live_dir: PathBuf,
    options: IssueOptions,
}

impl<'a> CertbotIssuer<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        certbot_bin: impl Into<String>,
        live_dir: impl Into<PathBuf>,
        options: IssueOptions,
    ) -> Self {
        Self {
            runner,
            certbot_bin: certbot_bin.into(),
            live_dir: live_dir.into(),
            options,
        }
    }
}

impl CertificateIssuer for CertbotIssuer<'_> {
    fn issue(&self, request: &CertificateRequest) -> Result<IssuedCertificate> {
        let args = request.certbot_args(&self.options);
        info!(
            primary = %request.primary_domain(),
            names = ?request.validation_names(),
            "Requesting certificate"
        );

        let output = self
            .runner
            .run(&self.certbot_bin, &args)
            .map_err(|e| CertError::IssuanceFailed {
                reason: format!("failed to run {}: {}", self.certbot_bin, e),
            })?;
        if !output.success() {
            warn!(code = ?output.code, "certbot reported failure");
            return Err(CertError::IssuanceFailed {
                reason: output.failure_reason(),
            });
        }

        let issued = IssuedCertificate::in_live_dir(&self.live_dir, request.primary_domain());
        if !issued.sources_exist() {
            return Err(CertError::IssuanceFailed {
                reason: format!(
                    "certbot succeeded but {} or {} is missing",
                    issued.cert_source_path.display(),
                    issued.key_source_path.display()
                ),
            });
        }
        info!(path = %issued.cert_source_path.display(), "Certificate issued");
        Ok(issued)
    }
}
