//! Certificate request assembly.

use std::path::{Path, PathBuf};

use crate::domains::DomainEntry;

/// Validation names in request order: each domain followed directly by its
/// wildcard form when requested. No deduplication.
pub fn to_validation_names(entries: &[DomainEntry]) -> Vec<String> {
    let mut names = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        names.push(entry.name.clone());
        if entry.include_wildcard {
            names.push(entry.wildcard_name());
        }
    }
    names
}

/// Issuance options that come from settings rather than the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueOptions {
    pub dns_provider: String,
    pub email: Option<String>,
    pub propagation_seconds: Option<u32>,
}

impl Default for IssueOptions {
    fn default() -> Self {
        Self {
            dns_provider: "cloudflare".to_string(),
            email: None,
            propagation_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    domains: Vec<DomainEntry>,
    credentials_path: PathBuf,
}

impl CertificateRequest {
    /// Returns `None` for an empty domain list.
    pub fn build(domains: Vec<DomainEntry>, credentials_path: impl Into<PathBuf>) -> Option<Self> {
        if domains.is_empty() {
            return None;
        }
        Some(Self {
            domains,
            credentials_path: credentials_path.into(),
        })
    }

    pub fn domains(&self) -> &[DomainEntry] {
        &self.domains
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn primary_domain(&self) -> &str {
        &self.domains[0].name
    }

    pub fn validation_names(&self) -> Vec<String> {
        to_validation_names(&self.domains)
    }

    /// certbot arguments for a non-interactive DNS-01 issuance.
    ///
    /// `--cert-name` pins the lineage to the primary domain so the
    /// live-certificate directory is predictable.
    pub fn certbot_args(&self, options: &IssueOptions) -> Vec<String> {
        let plugin = format!("--dns-{}", options.dns_provider);
        let mut args = vec![
            "certonly".to_string(),
            "--non-interactive".to_string(),
            "--agree-tos".to_string(),
            plugin.clone(),
            format!("{plugin}-credentials"),
            self.credentials_path.display().to_string(),
        ];
        if let Some(seconds) = options.propagation_seconds {
            args.push(format!("{plugin}-propagation-seconds"));
            args.push(seconds.to_string());
        }
        match options.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => {
                args.push("--email".to_string());
                args.push(email.to_string());
            }
            None => args.push("--register-unsafely-without-email".to_string()),
        }
        args.push("--cert-name".to_string());
        args.push(self.primary_domain().to_string());
        for name in self.validation_names() {
            args.push("-d".to_string());
            args.push(name);
        }
        args
    }
}
