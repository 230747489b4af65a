pub mod install;
pub mod menu;
pub mod update;

use std::path::PathBuf;

use marzcert_core::planner::display_paths;
use marzcert_core::{
    CertError, CertbotIssuer, CertificateDeployer, CertificateIssuer, CertificateRequest,
    CommandRunner, DistributionPlanner, DomainCollector, IssuedCertificate, PanelConfigOutcome,
    PanelEnvUpdate, PanelService, ReissueCoordinator, ReissueInputs, ReissueReport,
    ReloadOutcome, RunHistory, Settings, SystemRunner,
};
use tracing::warn;

use crate::output::{self, TerminalPrompter};
use crate::paths;
use crate::system::{CertbotInstaller, OsRelease, PackageManager};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Settings and run history from the marzcert home directory.
pub struct Workspace {
    pub home: PathBuf,
    pub settings: Settings,
    pub history: RunHistory,
}

impl Workspace {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let home = paths::marzcert_home_dir()?;
        let settings = Settings::load_from_home(&home)?;
        let history = match RunHistory::load_from_home(&home) {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable run history");
                RunHistory::default()
            }
        };
        Ok(Self {
            home,
            settings,
            history,
        })
    }

    pub fn planner(&self) -> DistributionPlanner {
        DistributionPlanner::from_settings(&self.settings)
    }

    /// Record a finished run. Failures are logged only.
    pub fn remember(&mut self, inputs: &ReissueInputs) {
        self.history.record(
            &inputs.domains,
            &inputs.plan.cert_filename,
            &inputs.plan.key_filename,
            &inputs.plan.directories,
        );
        if let Err(e) = self.history.save_to_home(&self.home) {
            warn!(error = %e, "Failed to save run history");
        }
    }
}

/// Detect the distribution. Unknown ones are a warning, an undetectable
/// one is an error.
pub fn detect_package_manager() -> Result<Option<PackageManager>, CertError> {
    let release = OsRelease::detect()?;
    let manager = release.package_manager(SystemRunner.exists("dnf"));
    match manager {
        Some(manager) => output::step(&format!(
            "Detected {} ({})",
            release.display_name(),
            manager.binary()
        )),
        None => output::warning(&format!(
            "{} is not a supported distribution, continuing without package installs",
            release.display_name()
        )),
    }
    Ok(manager)
}

/// Ask for domains, then filenames and directories.
pub fn collect_interactive(
    prompter: &mut TerminalPrompter,
    planner: &DistributionPlanner,
) -> marzcert_core::Result<ReissueInputs> {
    output::section("Domains");
    let domains = DomainCollector::collect(prompter)?;
    output::section("Distribution");
    let plan = planner.plan_interactive(prompter)?;
    Ok(ReissueInputs { domains, plan })
}

/// Announces the certbot run before delegating.
struct AnnouncingIssuer<'a>(CertbotIssuer<'a>);

impl CertificateIssuer for AnnouncingIssuer<'_> {
    fn issue(&self, request: &CertificateRequest) -> marzcert_core::Result<IssuedCertificate> {
        output::section("Issuance");
        output::step(&format!(
            "Requesting certificate for {}",
            request.validation_names().join(", ")
        ));
        output::muted("DNS propagation can take a minute or two");
        self.0.issue(request)
    }
}

/// Build the collaborators from `workspace` and run the reissue flow.
pub fn reissue<F>(
    workspace: &Workspace,
    manager: Option<PackageManager>,
    panel_env: Option<PanelEnvUpdate>,
    collect: F,
) -> Result<ReissueReport, CertError>
where
    F: FnOnce(&mut TerminalPrompter) -> marzcert_core::Result<ReissueInputs>,
{
    let settings = &workspace.settings;
    let runner = SystemRunner;
    let credentials = settings.credential_store();
    let installer = CertbotInstaller::new(
        &runner,
        manager,
        settings.certbot_bin.clone(),
        settings.dns_provider.clone(),
    );
    let issuer = AnnouncingIssuer(CertbotIssuer::new(
        &runner,
        settings.certbot_bin.clone(),
        settings.live_dir.clone(),
        settings.issue_options(),
    ));
    let deployer = CertificateDeployer::new(settings.primary_service_fragment.clone());
    let service = PanelService::new(&runner, settings.panel_command.clone());

    let mut coordinator =
        ReissueCoordinator::new(&credentials, &installer, &issuer, &deployer, &service);
    if let Some(update) = panel_env {
        coordinator = coordinator.with_panel_env(update);
    }

    let mut prompter = TerminalPrompter;
    coordinator.run(&mut prompter, collect).inspect_err(|e| {
        warn!(state = ?coordinator.state(), error = %e, "Reissue stopped");
    })
}

/// Print what happened to each destination and to the panel.
pub fn print_report(report: &ReissueReport) {
    output::section("Deployment");
    output::success(&format!(
        "Certificate issued for {}",
        output::emphasized(&report.issued.primary_domain)
    ));
    if output::is_verbose() {
        output::muted(&format!(
            "Source: {} / {}",
            report.issued.cert_source_path.display(),
            report.issued.key_source_path.display()
        ));
    }
    for outcome in &report.deployment.outcomes {
        let dir = outcome.target.directory.display();
        match &outcome.error {
            None => output::success(&format!("Updated {dir}")),
            Some(e) => output::error(&format!("{dir}: {e}")),
        }
    }
    if report.inputs.plan.fell_back_to_defaults {
        output::muted(&format!(
            "Default directories were used: {}",
            display_paths(&report.inputs.plan.directories)
        ));
    }

    match &report.panel_config {
        Some(PanelConfigOutcome::TlsEnabled(dir)) => output::success(&format!(
            "Panel TLS now uses the certificate in {}",
            dir.display()
        )),
        Some(PanelConfigOutcome::TlsSkipped) => output::warning(
            "No panel certificate directory was updated, panel TLS left unchanged",
        ),
        Some(PanelConfigOutcome::Failed(e)) => {
            output::warning(&format!("Could not update panel settings: {e}"))
        }
        None => {}
    }

    match &report.reload {
        ReloadOutcome::Restarted => output::success("Panel restarted"),
        ReloadOutcome::NotInstalled => output::muted("Panel not installed, restart skipped"),
        ReloadOutcome::Failed(e) => output::warning(&format!(
            "Panel restart failed, certificates are in place: {e}"
        )),
    }

    let failures = report.deployment.failures().len();
    if failures > 0 {
        output::warning(&format!(
            "{failures} of {} directories were not updated",
            report.deployment.outcomes.len()
        ));
    }
}
