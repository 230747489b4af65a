//! Reissue flow: prerequisites, issuance, deployment, panel restart.
//!
//! ```text
//! CheckingPrereqs -> Issuing -> Deploying -> NotifyingService -> Done
//! ```
//!
//! Any state may exit with an error. Deployment and restart problems are
//! reported in the [`ReissueReport`] and never stop the flow.

use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::credentials::CredentialStore;
use crate::deployer::{CertificateDeployer, DeploymentResult};
use crate::domains::DomainEntry;
use crate::error::{CertError, Result, ServiceReloadError};
use crate::issuer::{CertificateIssuer, IssuedCertificate};
use crate::panel_env::PanelEnv;
use crate::planner::DistributionPlan;
use crate::prompt::Prompter;
use crate::request::CertificateRequest;
use crate::service::ServiceManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReissueState {
    CheckingPrereqs,
    Issuing,
    Deploying,
    NotifyingService,
    Done,
}

/// Installs the certificate client when it is missing.
pub trait ClientInstaller {
    fn is_installed(&self) -> bool;
    fn install(&self) -> Result<()>;
}

/// What to issue and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReissueInputs {
    pub domains: Vec<DomainEntry>,
    pub plan: DistributionPlan,
}

/// Panel settings written after deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelEnvUpdate {
    pub path: PathBuf,
    pub port: Option<u16>,
    pub dashboard_path: Option<String>,
}

#[derive(Debug)]
pub enum PanelConfigOutcome {
    /// Certificate paths were written
    TlsEnabled(PathBuf),
    /// No deployed directory belongs to the panel
    TlsSkipped,
    Failed(ConfigError),
}

#[derive(Debug)]
pub enum ReloadOutcome {
    Restarted,
    NotInstalled,
    Failed(ServiceReloadError),
}

#[derive(Debug)]
pub struct ReissueReport {
    pub inputs: ReissueInputs,
    pub issued: IssuedCertificate,
    pub deployment: DeploymentResult,
    pub panel_config: Option<PanelConfigOutcome>,
    pub reload: ReloadOutcome,
    pub states: Vec<ReissueState>,
}

pub struct ReissueCoordinator<'a> {
    credentials: &'a CredentialStore,
    installer: &'a dyn ClientInstaller,
    issuer: &'a dyn CertificateIssuer,
    deployer: &'a CertificateDeployer,
    service: &'a dyn ServiceManager,
    panel_env: Option<PanelEnvUpdate>,
    state: ReissueState,
    visited: Vec<ReissueState>,
}

impl<'a> ReissueCoordinator<'a> {
    pub fn new(
        credentials: &'a CredentialStore,
        installer: &'a dyn ClientInstaller,
        issuer: &'a dyn CertificateIssuer,
        deployer: &'a CertificateDeployer,
        service: &'a dyn ServiceManager,
    ) -> Self {
        Self {
            credentials,
            installer,
            issuer,
            deployer,
            service,
            panel_env: None,
            state: ReissueState::CheckingPrereqs,
            visited: vec![ReissueState::CheckingPrereqs],
        }
    }

    pub fn with_panel_env(mut self, update: PanelEnvUpdate) -> Self {
        self.panel_env = Some(update);
        self
    }

    /// Current state; after an error this is the state that failed.
    pub fn state(&self) -> ReissueState {
        self.state
    }

    fn advance(&mut self, next: ReissueState) {
        info!(from = ?self.state, to = ?next, "Reissue state change");
        self.state = next;
        self.visited.push(next);
    }

    /// Run the whole flow. `collect` supplies domains and destinations once
    /// prerequisites hold.
    pub fn run<P, F>(&mut self, prompter: &mut P, collect: F) -> Result<ReissueReport>
    where
        P: Prompter + ?Sized,
        F: FnOnce(&mut P) -> Result<ReissueInputs>,
    {
        self.ensure_prereqs(prompter)?;
        let inputs = collect(prompter)?;
        let request = CertificateRequest::build(
            inputs.domains.clone(),
            self.credentials.path().to_path_buf(),
        )
        .ok_or_else(|| CertError::Environment("At least one domain is required".to_string()))?;

        self.advance(ReissueState::Issuing);
        let issued = self.issuer.issue(&request)?;

        self.advance(ReissueState::Deploying);
        let deployment = self.deployer.deploy(&issued, &inputs.plan);
        for (target, err) in deployment.failures() {
            warn!(directory = %target.directory.display(), error = %err, "Directory not updated");
        }
        let panel_config = self
            .panel_env
            .as_ref()
            .map(|update| apply_panel_env(update, &deployment));

        self.advance(ReissueState::NotifyingService);
        let reload = self.notify_service();

        self.advance(ReissueState::Done);
        Ok(ReissueReport {
            inputs,
            issued,
            deployment,
            panel_config,
            reload,
            states: self.visited.clone(),
        })
    }

    fn ensure_prereqs<P: Prompter + ?Sized>(&mut self, prompter: &mut P) -> Result<()> {
        if !self.installer.is_installed() {
            info!("Certificate client missing, installing");
            self.installer.install()?;
            if !self.installer.is_installed() {
                return Err(CertError::ClientInstall(
                    "client still not available after installation".to_string(),
                ));
            }
        }

        if !self.credentials.exists() {
            let token = prompt_token(prompter)?;
            self.credentials.ensure(&token)?;
        }
        Ok(())
    }

    fn notify_service(&self) -> ReloadOutcome {
        if !self.service.is_installed() {
            info!("Panel service not installed, skipping restart");
            return ReloadOutcome::NotInstalled;
        }
        match self.service.restart() {
            Ok(()) => ReloadOutcome::Restarted,
            Err(e) => {
                warn!(error = %e, "Panel restart failed");
                ReloadOutcome::Failed(e)
            }
        }
    }
}

/// Ask for the DNS provider API token until a non-empty value is given.
pub fn prompt_token<P: Prompter + ?Sized>(prompter: &mut P) -> io::Result<String> {
    loop {
        let token = prompter.secret("DNS provider API token")?;
        let token = token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
        prompter.warn("The API token cannot be empty");
    }
}

fn apply_panel_env(update: &PanelEnvUpdate, deployment: &DeploymentResult) -> PanelConfigOutcome {
    let mut env = match PanelEnv::load(&update.path) {
        Ok(env) => env,
        Err(ConfigError::FileRead(_, e)) if e.kind() == io::ErrorKind::NotFound => {
            PanelEnv::default()
        }
        Err(e) => return PanelConfigOutcome::Failed(e),
    };
    if let Some(port) = update.port {
        env.set_port(port);
    }
    if let Some(path) = update.dashboard_path.as_deref() {
        env.set_dashboard_path(path);
    }

    let outcome = match deployment.deployed_primary_service_target() {
        Some(target) => {
            env.enable_tls(target);
            PanelConfigOutcome::TlsEnabled(target.directory.clone())
        }
        None => PanelConfigOutcome::TlsSkipped,
    };
    match env.save(&update.path) {
        Ok(()) => outcome,
        Err(e) => PanelConfigOutcome::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::DistributionPlanner;
    use crate::prompt::ScriptedPrompter;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct FakeInstaller {
        installed: Cell<bool>,
        install_works: bool,
        installs: Cell<u32>,
    }

    impl FakeInstaller {
        fn present() -> Self {
            Self {
                installed: Cell::new(true),
                install_works: true,
                installs: Cell::new(0),
            }
        }

        fn missing(install_works: bool) -> Self {
            Self {
                installed: Cell::new(false),
                install_works,
                installs: Cell::new(0),
            }
        }
    }

    impl ClientInstaller for FakeInstaller {
        fn is_installed(&self) -> bool {
            self.installed.get()
        }

        fn install(&self) -> Result<()> {
            self.installs.set(self.installs.get() + 1);
            if self.install_works {
                self.installed.set(true);
                Ok(())
            } else {
                Err(CertError::ClientInstall("apt-get failed".to_string()))
            }
        }
    }

    struct FakeIssuer {
        live_dir: PathBuf,
        fail: bool,
        requests: RefCell<Vec<Vec<String>>>,
    }

    impl CertificateIssuer for FakeIssuer {
        fn issue(&self, request: &CertificateRequest) -> Result<IssuedCertificate> {
            self.requests.borrow_mut().push(request.validation_names());
            if self.fail {
                return Err(CertError::IssuanceFailed {
                    reason: "DNS problem".to_string(),
                });
            }
            let issued = IssuedCertificate::in_live_dir(&self.live_dir, request.primary_domain());
            fs::create_dir_all(issued.cert_source_path.parent().unwrap()).unwrap();
            fs::write(&issued.cert_source_path, "CERT").unwrap();
            fs::write(&issued.key_source_path, "KEY").unwrap();
            Ok(issued)
        }
    }

    struct FakeService {
        installed: bool,
        fail: bool,
        restarts: Cell<u32>,
    }

    impl ServiceManager for FakeService {
        fn is_installed(&self) -> bool {
            self.installed
        }

        fn restart(&self) -> std::result::Result<(), ServiceReloadError> {
            self.restarts.set(self.restarts.get() + 1);
            if self.fail {
                Err(ServiceReloadError::Failed {
                    code: 1,
                    stderr: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        temp: TempDir,
        credentials: CredentialStore,
        deployer: CertificateDeployer,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let credentials =
                CredentialStore::new(temp.path().join("secrets/cloudflare.ini"), "cloudflare");
            Self {
                temp,
                credentials,
                deployer: CertificateDeployer::new("marzneshin"),
            }
        }

        fn root(&self) -> &Path {
            self.temp.path()
        }

        fn issuer(&self, fail: bool) -> FakeIssuer {
            FakeIssuer {
                live_dir: self.root().join("live"),
                fail,
                requests: RefCell::new(Vec::new()),
            }
        }

        fn inputs(&self, dirs: &[PathBuf]) -> ReissueInputs {
            let dirs: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
            let plan = DistributionPlanner::new("cert.pem", "key.pem", vec![
                self.root().join("var/lib/marzneshin/certs"),
                self.root().join("var/lib/marznode/certs"),
            ])
            .plan(dirs.is_empty(), None, Some(dirs.as_slice()));
            ReissueInputs {
                domains: vec![DomainEntry::new("example.com", true)],
                plan,
            }
        }
    }

    fn service(installed: bool, fail: bool) -> FakeService {
        FakeService {
            installed,
            fail,
            restarts: Cell::new(0),
        }
    }

    #[test]
    fn full_run_visits_every_state_in_order() {
        let fx = Fixture::new();
        fx.credentials.ensure("tok").unwrap();
        let installer = FakeInstaller::present();
        let issuer = fx.issuer(false);
        let svc = service(true, false);
        let mut prompter = ScriptedPrompter::default();

        let report =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &svc)
                .run(&mut prompter, |_| Ok(fx.inputs(&[])))
                .unwrap();

        assert_eq!(
            report.states,
            vec![
                ReissueState::CheckingPrereqs,
                ReissueState::Issuing,
                ReissueState::Deploying,
                ReissueState::NotifyingService,
                ReissueState::Done,
            ]
        );
        assert_eq!(
            issuer.requests.borrow()[0],
            vec!["example.com".to_string(), "*.example.com".to_string()]
        );
        assert!(report.deployment.all_succeeded());
        assert_eq!(report.deployment.outcomes.len(), 2);
        assert_eq!(
            report.deployment.primary_service_target.unwrap().directory,
            fx.root().join("var/lib/marzneshin/certs")
        );
        assert!(matches!(report.reload, ReloadOutcome::Restarted));
        assert_eq!(svc.restarts.get(), 1);
    }

    #[test]
    fn missing_prereqs_install_client_and_prompt_for_token() {
        let fx = Fixture::new();
        let installer = FakeInstaller::missing(true);
        let issuer = fx.issuer(false);
        let svc = service(true, false);
        let mut prompter = ScriptedPrompter::new(["", "cf-token"]);

        ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &svc)
            .run(&mut prompter, |_| Ok(fx.inputs(&[])))
            .unwrap();

        assert_eq!(installer.installs.get(), 1);
        assert_eq!(fx.credentials.load().unwrap().token, "cf-token");
        assert_eq!(prompter.warnings().len(), 1);
        assert_eq!(
            prompter.secret_prompts(),
            ["DNS provider API token", "DNS provider API token"]
        );
    }

    #[test]
    fn interrupted_collection_stops_before_issuing() {
        let fx = Fixture::new();
        fx.credentials.ensure("tok").unwrap();
        let installer = FakeInstaller::present();
        let issuer = fx.issuer(false);
        let svc = service(true, false);
        let mut prompter = ScriptedPrompter::default();

        let mut coordinator =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &svc);
        let err = coordinator
            .run(&mut prompter, |p| {
                p.input("Domain")?;
                Ok(fx.inputs(&[]))
            })
            .unwrap_err();

        assert!(matches!(err, CertError::Prompt(_)));
        assert_eq!(coordinator.state(), ReissueState::CheckingPrereqs);
        assert!(issuer.requests.borrow().is_empty());
        assert_eq!(svc.restarts.get(), 0);
    }

    #[test]
    fn failed_client_install_stops_before_issuing() {
        let fx = Fixture::new();
        let installer = FakeInstaller::missing(false);
        let issuer = fx.issuer(false);
        let svc = service(true, false);
        let mut prompter = ScriptedPrompter::default();

        let mut coordinator =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &svc);
        let err = coordinator
            .run(&mut prompter, |_| Ok(fx.inputs(&[])))
            .unwrap_err();
        assert!(matches!(err, CertError::ClientInstall(_)));
        assert_eq!(coordinator.state(), ReissueState::CheckingPrereqs);
        assert!(issuer.requests.borrow().is_empty());
    }

    #[test]
    fn issuance_failure_skips_deploy_and_restart() {
        let fx = Fixture::new();
        fx.credentials.ensure("tok").unwrap();
        let installer = FakeInstaller::present();
        let issuer = fx.issuer(true);
        let svc = service(true, false);
        let mut prompter = ScriptedPrompter::default();

        let mut coordinator =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &svc);
        let err = coordinator
            .run(&mut prompter, |_| Ok(fx.inputs(&[])))
            .unwrap_err();
        assert!(matches!(err, CertError::IssuanceFailed { .. }));
        assert_eq!(coordinator.state(), ReissueState::Issuing);
        assert_eq!(svc.restarts.get(), 0);
        assert!(!fx.root().join("var/lib/marzneshin/certs").exists());
    }

    #[test]
    fn partial_deploy_failure_still_notifies_service() {
        let fx = Fixture::new();
        fx.credentials.ensure("tok").unwrap();
        let blocker = fx.root().join("blocker");
        fs::write(&blocker, "file").unwrap();
        let installer = FakeInstaller::present();
        let issuer = fx.issuer(false);
        let svc = service(true, false);
        let mut prompter = ScriptedPrompter::default();
        let dirs = [
            fx.root().join("a"),
            blocker.join("certs"),
            fx.root().join("c"),
        ];

        let report =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &svc)
                .run(&mut prompter, |_| Ok(fx.inputs(&dirs)))
                .unwrap();

        assert_eq!(report.deployment.succeeded().len(), 2);
        assert_eq!(report.deployment.failures().len(), 1);
        assert!(report.states.contains(&ReissueState::NotifyingService));
        assert_eq!(svc.restarts.get(), 1);
    }

    #[test]
    fn missing_or_failing_service_does_not_fail_the_run() {
        let fx = Fixture::new();
        fx.credentials.ensure("tok").unwrap();
        let installer = FakeInstaller::present();
        let issuer = fx.issuer(false);
        let mut prompter = ScriptedPrompter::default();

        let absent = service(false, false);
        let report =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &absent)
                .run(&mut prompter, |_| Ok(fx.inputs(&[])))
                .unwrap();
        assert!(matches!(report.reload, ReloadOutcome::NotInstalled));
        assert_eq!(absent.restarts.get(), 0);

        let failing = service(true, true);
        let report =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &failing)
                .run(&mut prompter, |_| Ok(fx.inputs(&[])))
                .unwrap();
        assert!(matches!(report.reload, ReloadOutcome::Failed(_)));
        assert_eq!(report.states.last(), Some(&ReissueState::Done));
    }

    #[test]
    fn panel_env_gets_tls_paths_when_panel_directory_deployed() {
        let fx = Fixture::new();
        fx.credentials.ensure("tok").unwrap();
        let env_path = fx.root().join("etc/opt/marzneshin/.env");
        fs::create_dir_all(env_path.parent().unwrap()).unwrap();
        fs::write(&env_path, "# SSL_CERTFILE = \"\"\n# SSL_KEYFILE = \"\"\n").unwrap();
        let installer = FakeInstaller::present();
        let issuer = fx.issuer(false);
        let svc = service(true, false);
        let mut prompter = ScriptedPrompter::default();

        let report =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &svc)
                .with_panel_env(PanelEnvUpdate {
                    path: env_path.clone(),
                    port: Some(8443),
                    dashboard_path: Some("panel".to_string()),
                })
                .run(&mut prompter, |_| Ok(fx.inputs(&[])))
                .unwrap();

        assert!(matches!(
            report.panel_config,
            Some(PanelConfigOutcome::TlsEnabled(_))
        ));
        let env = PanelEnv::load(&env_path).unwrap();
        let panel_dir = fx.root().join("var/lib/marzneshin/certs");
        assert_eq!(
            env.get("SSL_CERTFILE"),
            Some(panel_dir.join("cert.pem").to_str().unwrap())
        );
        assert_eq!(env.get("PORT"), Some("8443"));
        assert_eq!(env.get("DASHBOARD_PATH"), Some("/panel"));
    }

    #[test]
    fn panel_env_skips_tls_without_panel_directory() {
        let fx = Fixture::new();
        fx.credentials.ensure("tok").unwrap();
        let env_path = fx.root().join(".env");
        let installer = FakeInstaller::present();
        let issuer = fx.issuer(false);
        let svc = service(true, false);
        let mut prompter = ScriptedPrompter::default();
        let dirs = [fx.root().join("node-only")];

        let report =
            ReissueCoordinator::new(&fx.credentials, &installer, &issuer, &fx.deployer, &svc)
                .with_panel_env(PanelEnvUpdate {
                    path: env_path.clone(),
                    port: None,
                    dashboard_path: None,
                })
                .run(&mut prompter, |_| Ok(fx.inputs(&dirs)))
                .unwrap();

        assert!(matches!(
            report.panel_config,
            Some(PanelConfigOutcome::TlsSkipped)
        ));
        assert_eq!(PanelEnv::load(&env_path).unwrap().get("SSL_CERTFILE"), None);
    }
}
