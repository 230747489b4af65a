//! Host collaborators: privilege, OS detection, packages and installers.

use std::process::{Command, Stdio};

use marzcert_core::{CertError, ClientInstaller, CommandRunner};
use tracing::{debug, info};

const OS_RELEASE_PATH: &str = "/etc/os-release";
const DOCKER_INSTALL_URL: &str = "https://get.docker.com";
const PANEL_INSTALL_URL: &str =
    "https://github.com/marzneshin/Marzneshin/raw/master/script.sh";

/// Tools the install flow needs besides certbot.
pub const BASE_PACKAGES: &[&str] = &["curl", "socat", "git"];

pub fn check_privilege() -> Result<(), CertError> {
    #[cfg(unix)]
    {
        if unsafe { libc::geteuid() } == 0 {
            return Ok(());
        }
    }
    Err(CertError::Privilege(
        "marzcert must be run as root".to_string(),
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub id_like: Vec<String>,
    pub pretty_name: Option<String>,
}

impl OsRelease {
    pub fn parse(content: &str) -> Self {
        let mut release = OsRelease::default();
        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.trim() {
                "ID" => release.id = value.to_ascii_lowercase(),
                "ID_LIKE" => {
                    release.id_like = value
                        .split_whitespace()
                        .map(|s| s.to_ascii_lowercase())
                        .collect()
                }
                "PRETTY_NAME" => release.pretty_name = Some(value.to_string()),
                _ => {}
            }
        }
        release
    }

    /// Read `/etc/os-release`. A host without one cannot be set up.
    pub fn detect() -> Result<Self, CertError> {
        let content = std::fs::read_to_string(OS_RELEASE_PATH).map_err(|e| {
            CertError::Environment(format!("cannot detect the operating system: {e}"))
        })?;
        let release = Self::parse(&content);
        if release.id.is_empty() {
            return Err(CertError::Environment(format!(
                "{OS_RELEASE_PATH} does not name the operating system"
            )));
        }
        Ok(release)
    }

    pub fn display_name(&self) -> &str {
        self.pretty_name.as_deref().unwrap_or(&self.id)
    }

    fn is_like(&self, family: &[&str]) -> bool {
        family.contains(&self.id.as_str())
            || self.id_like.iter().any(|like| family.contains(&like.as_str()))
    }

    /// Package manager for this distribution, `None` when unsupported.
    pub fn package_manager(&self, has_dnf: bool) -> Option<PackageManager> {
        if self.is_like(&["debian", "ubuntu"]) {
            return Some(PackageManager::Apt);
        }
        if self.is_like(&["fedora", "rhel", "centos", "rocky", "almalinux"]) {
            return Some(if has_dnf {
                PackageManager::Dnf
            } else {
                PackageManager::Yum
            });
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    pub fn binary(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
        }
    }

    fn refresh_args(self) -> Option<Vec<String>> {
        match self {
            PackageManager::Apt => Some(vec!["update".to_string()]),
            PackageManager::Dnf | PackageManager::Yum => None,
        }
    }

    fn install_args(self, packages: &[String]) -> Vec<String> {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        if self == PackageManager::Apt {
            args.push("-qq".to_string());
        }
        args.extend(packages.iter().cloned());
        args
    }

    pub fn install(self, runner: &dyn CommandRunner, packages: &[String]) -> Result<(), CertError> {
        if let Some(args) = self.refresh_args() {
            run_checked(runner, self.binary(), &args)?;
        }
        info!(manager = self.binary(), ?packages, "Installing packages");
        run_checked(runner, self.binary(), &self.install_args(packages))
    }
}

fn run_checked(runner: &dyn CommandRunner, program: &str, args: &[String]) -> Result<(), CertError> {
    let output = runner
        .run(program, args)
        .map_err(|e| CertError::ClientInstall(format!("failed to start {program}: {e}")))?;
    if !output.success() {
        return Err(CertError::ClientInstall(format!(
            "{program} {}: {}",
            args.join(" "),
            output.failure_reason()
        )));
    }
    Ok(())
}

/// Package names for certbot and its DNS plugin.
pub fn certbot_packages(dns_provider: &str) -> Vec<String> {
    vec![
        "certbot".to_string(),
        format!("python3-certbot-dns-{dns_provider}"),
    ]
}

/// Installs certbot through the distribution's package manager.
pub struct CertbotInstaller<'a> {
    runner: &'a dyn CommandRunner,
    manager: Option<PackageManager>,
    certbot_bin: String,
    dns_provider: String,
}

impl<'a> CertbotInstaller<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        manager: Option<PackageManager>,
        certbot_bin: impl Into<String>,
        dns_provider: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            manager,
            certbot_bin: certbot_bin.into(),
            dns_provider: dns_provider.into(),
        }
    }
}

impl ClientInstaller for CertbotInstaller<'_> {
    fn is_installed(&self) -> bool {
        self.runner.exists(&self.certbot_bin)
    }

    fn install(&self) -> Result<(), CertError> {
        let Some(manager) = self.manager else {
            return Err(CertError::ClientInstall(format!(
                "no supported package manager; install certbot and the {} DNS plugin manually",
                self.dns_provider
            )));
        };
        manager.install(self.runner, &certbot_packages(&self.dns_provider))
    }
}

/// A remote shell installer fetched with curl or wget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInstaller {
    pub name: &'static str,
    pub url: &'static str,
    pub shell: &'static str,
    pub args: Vec<String>,
}

impl RemoteInstaller {
    pub fn docker() -> Self {
        Self {
            name: "Docker",
            url: DOCKER_INSTALL_URL,
            shell: "sh",
            args: Vec::new(),
        }
    }

    pub fn panel() -> Self {
        Self {
            name: "Marzneshin",
            url: PANEL_INSTALL_URL,
            shell: "bash",
            args: vec!["install".to_string()],
        }
    }

    /// Download the script body with whichever of curl or wget is present.
    fn fetch(&self, runner: &dyn CommandRunner) -> Result<String, CertError> {
        let (program, flag) = if runner.exists("curl") {
            ("curl", "-fsSL")
        } else if runner.exists("wget") {
            ("wget", "-qO-")
        } else {
            return Err(CertError::ClientInstall(format!(
                "neither curl nor wget is available to download the {} installer",
                self.name
            )));
        };

        let output = runner
            .run(program, &[flag.to_string(), self.url.to_string()])
            .map_err(|e| CertError::ClientInstall(format!("failed to start {program}: {e}")))?;
        if !output.success() {
            return Err(CertError::ClientInstall(format!(
                "failed to download the {} installer from {}",
                self.name, self.url
            )));
        }
        Ok(output.stdout)
    }

    /// Download the script and run it with the terminal attached, so
    /// installers that ask questions still work.
    pub fn run(&self, runner: &dyn CommandRunner) -> Result<(), CertError> {
        let script = self.fetch(runner)?;

        debug!(installer = self.name, url = self.url, "Running installer");
        let status = Command::new(self.shell)
            .arg("-c")
            .arg(&script)
            .arg(self.name)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| {
                CertError::ClientInstall(format!("failed to start installer shell: {e}"))
            })?;

        if !status.success() {
            return Err(CertError::ClientInstall(format!(
                "{} installer exited with a non-zero status",
                self.name
            )));
        }
        Ok(())
    }
}
