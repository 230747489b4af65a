use marzcert_core::{
    CertError, CommandRunner, CredentialStore, PanelEnvUpdate, PanelService, ServiceManager,
    SystemRunner,
};

use super::{CommandResult, Workspace};
use crate::commands;
use crate::output;
use crate::system::{self, BASE_PACKAGES, RemoteInstaller};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DASHBOARD_PATH: &str = "dashboard";

pub fn run() -> CommandResult {
    output::section("Install");
    system::check_privilege()?;
    let mut workspace = Workspace::load()?;
    let manager = commands::detect_package_manager()?;
    let runner = SystemRunner;

    if let Some(manager) = manager {
        let packages: Vec<String> = BASE_PACKAGES.iter().map(|p| p.to_string()).collect();
        output::with_spinner(format!("Installing {}...", packages.join(", ")), || {
            manager.install(&runner, &packages)
        })??;
    }

    if runner.exists("docker") {
        output::muted("Docker is already installed");
    } else {
        output::step("Installing Docker");
        RemoteInstaller::docker().run(&runner)?;
        output::success("Docker installed");
    }

    let service = PanelService::new(&runner, workspace.settings.panel_command.clone());
    if service.is_installed() {
        output::muted("Marzneshin is already installed");
    } else {
        output::step("Installing Marzneshin");
        RemoteInstaller::panel().run(&runner)?;
        output::success("Marzneshin installed");
    }

    output::section("Panel");
    let port = prompt_port()?;
    let dashboard_path = output::prompt_input("Dashboard path", Some(DEFAULT_DASHBOARD_PATH))?;

    output::section("DNS credentials");
    ensure_credentials(&workspace.settings.credential_store())?;

    let planner = workspace.planner();
    let panel_env = PanelEnvUpdate {
        path: workspace.settings.panel_env_path.clone(),
        port: Some(port),
        dashboard_path: Some(dashboard_path_or_default(&dashboard_path)),
    };
    let report = commands::reissue(&workspace, manager, Some(panel_env), |prompter| {
        commands::collect_interactive(prompter, &planner)
    })?;

    commands::print_report(&report);
    workspace.remember(&report.inputs);
    output::success("Installation complete");
    Ok(())
}

/// Blank input selects the default port.
fn parse_port(input: &str) -> Option<u16> {
    let input = input.trim();
    if input.is_empty() {
        return Some(DEFAULT_PORT);
    }
    input.parse::<u16>().ok().filter(|port| *port != 0)
}

fn dashboard_path_or_default(input: &str) -> String {
    match input.trim() {
        "" => DEFAULT_DASHBOARD_PATH.to_string(),
        path => path.to_string(),
    }
}

fn prompt_port() -> std::io::Result<u16> {
    loop {
        let answer = output::prompt_input("Panel port", Some(&DEFAULT_PORT.to_string()))?;
        match parse_port(&answer) {
            Some(port) => return Ok(port),
            None => output::warning("Enter a port between 1 and 65535"),
        }
    }
}

/// Keep an existing token unless the operator wants to replace it.
fn ensure_credentials(store: &CredentialStore) -> Result<(), CertError> {
    if store.exists() {
        output::muted(&format!(
            "Using the API token stored in {}",
            store.path().display()
        ));
        if !output::confirm("Replace the stored API token?", false)? {
            return Ok(());
        }
    }

    let token = loop {
        let token = output::prompt_password("DNS provider API token")?;
        let token = token.trim();
        if !token.is_empty() {
            break token.to_string();
        }
        output::warning("The API token cannot be empty");
    };
    let record = store.ensure(&token)?;
    output::success(&format!(
        "Saved credentials to {}",
        record.provider_token_path.display()
    ));
    Ok(())
}
