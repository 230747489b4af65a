//! Copies the issued certificate pair into every destination directory.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::DeployError;
use crate::issuer::IssuedCertificate;
use crate::planner::{DistributionPlan, DistributionTarget, find_primary_service_target};

/// Mode for deployed files; services read them as a different user.
const DEPLOYED_FILE_MODE: u32 = 0o644;

#[derive(Debug)]
pub struct TargetOutcome {
    pub target: DistributionTarget,
    pub error: Option<DeployError>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
pub struct DeploymentResult {
    /// One outcome per requested directory, in request order
    pub outcomes: Vec<TargetOutcome>,
    /// First requested target inside the panel's certificate directory
    pub primary_service_target: Option<DistributionTarget>,
}

impl DeploymentResult {
    pub fn targets(&self) -> impl Iterator<Item = &DistributionTarget> {
        self.outcomes.iter().map(|outcome| &outcome.target)
    }

    pub fn succeeded(&self) -> Vec<&DistributionTarget> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .map(|outcome| &outcome.target)
            .collect()
    }

    pub fn failures(&self) -> Vec<(&DistributionTarget, &DeployError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.error.as_ref().map(|err| (&outcome.target, err)))
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }

    /// The primary service target, only if its copy succeeded.
    pub fn deployed_primary_service_target(&self) -> Option<&DistributionTarget> {
        let primary = self.primary_service_target.as_ref()?;
        self.outcomes
            .iter()
            .find(|outcome| &outcome.target == primary)
            .filter(|outcome| outcome.is_success())
            .map(|outcome| &outcome.target)
    }
}

#[derive(Debug, Clone)]
pub struct CertificateDeployer {
    primary_service_fragment: String,
}

impl CertificateDeployer {
    pub fn new(primary_service_fragment: impl Into<String>) -> Self {
        Self {
            primary_service_fragment: primary_service_fragment.into(),
        }
    }

    /// Deploy to every planned directory. A failing directory does not stop
    /// the remaining ones.
    pub fn deploy(&self, source: &IssuedCertificate, plan: &DistributionPlan) -> DeploymentResult {
        let targets = plan.targets();
        let mut outcomes = Vec::with_capacity(targets.len());

        for target in targets {
            let error = match deploy_to_target(source, &target) {
                Ok(()) => {
                    info!(directory = %target.directory.display(), "Certificate deployed");
                    None
                }
                Err(e) => {
                    warn!(directory = %target.directory.display(), error = %e, "Deployment failed");
                    Some(e)
                }
            };
            outcomes.push(TargetOutcome { target, error });
        }

        let primary_service_target = find_primary_service_target(
            outcomes.iter().map(|outcome| &outcome.target),
            &self.primary_service_fragment,
        )
        .cloned();

        DeploymentResult {
            outcomes,
            primary_service_target,
        }
    }
}

fn deploy_to_target(
    source: &IssuedCertificate,
    target: &DistributionTarget,
) -> Result<(), DeployError> {
    // Check sources before touching the destination so a failed issuance
    // never removes a working certificate.
    for path in [&source.cert_source_path, &source.key_source_path] {
        if !path.is_file() {
            return Err(DeployError::MissingSource(path.clone()));
        }
    }

    fs::create_dir_all(&target.directory).map_err(|e| DeployError::CreateDir {
        path: target.directory.clone(),
        source: e,
    })?;

    let pairs = [
        (&source.cert_source_path, target.cert_path()),
        (&source.key_source_path, target.key_path()),
    ];
    for (from, to) in &pairs {
        replace_file(from, to)?;
    }
    Ok(())
}

fn replace_file(from: &Path, to: &Path) -> Result<(), DeployError> {
    if to.exists() {
        fs::remove_file(to).map_err(|e| DeployError::RemoveStale {
            path: to.to_path_buf(),
            source: e,
        })?;
        debug!(path = %to.display(), "Removed existing file");
    }

    fs::copy(from, to).map_err(|e| DeployError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(to, fs::Permissions::from_mode(DEPLOYED_FILE_MODE)).map_err(|e| {
            DeployError::Permissions {
                path: to.to_path_buf(),
                source: e,
            }
        })?;
    }
    Ok(())
}
