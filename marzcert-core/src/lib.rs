//! Certificate issuance and distribution for Marzneshin deployments.
//!
//! Collects domains, asks certbot for a DNS-01 validated certificate and
//! copies the resulting pair into the directories read by the panel and its
//! nodes.

pub mod config;
pub mod credentials;
pub mod deployer;
pub mod domains;
pub mod error;
pub mod issuer;
pub mod panel_env;
pub mod planner;
pub mod process;
pub mod prompt;
pub mod reissue;
pub mod request;
pub mod service;

pub use config::{ConfigError, RunHistory, Settings};
pub use credentials::{CredentialRecord, CredentialStore};
pub use deployer::{CertificateDeployer, DeploymentResult, TargetOutcome};
pub use domains::{DomainCollector, DomainEntry};
pub use error::{CertError, DeployError, Result, ServiceReloadError};
pub use issuer::{CertbotIssuer, CertificateIssuer, IssuedCertificate};
pub use planner::{DistributionPlan, DistributionPlanner, DistributionTarget};
pub use process::{CommandOutput, CommandRunner, SystemRunner};
pub use prompt::{Prompter, ScriptedPrompter};
pub use reissue::{
    ClientInstaller, PanelConfigOutcome, PanelEnvUpdate, ReissueCoordinator, ReissueInputs,
    ReissueReport, ReissueState, ReloadOutcome,
};
pub use request::{CertificateRequest, IssueOptions, to_validation_names};
pub use service::{PanelService, ServiceManager};
