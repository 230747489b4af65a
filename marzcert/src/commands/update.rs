use marzcert_core::config::LastRun;
use marzcert_core::planner::display_paths;
use marzcert_core::{
    DistributionPlanner, DomainCollector, PanelEnvUpdate, Prompter, ReissueInputs, Settings,
};

use super::{CommandResult, Workspace};
use crate::commands;
use crate::output;
use crate::system;

pub fn run() -> CommandResult {
    output::section("Update certificates");
    system::check_privilege()?;
    let mut workspace = Workspace::load()?;
    let manager = commands::detect_package_manager()?;

    let planner = workspace.planner();
    let previous = workspace.history.last.clone();
    let panel_env = existing_panel_env(&workspace.settings);

    let report = commands::reissue(&workspace, manager, panel_env, |prompter| {
        if let Some(last) = previous.as_ref()
            && reuse_previous(prompter, last)?
        {
            return inputs_from_history(&planner, last);
        }
        commands::collect_interactive(prompter, &planner)
    })?;

    commands::print_report(&report);
    workspace.remember(&report.inputs);
    output::success("Certificates updated");
    Ok(())
}

/// Rewire panel TLS only when the panel has been configured before.
fn existing_panel_env(settings: &Settings) -> Option<PanelEnvUpdate> {
    settings.panel_env_path.is_file().then(|| PanelEnvUpdate {
        path: settings.panel_env_path.clone(),
        port: None,
        dashboard_path: None,
    })
}

fn describe_domains(last: &LastRun) -> String {
    last.domains
        .iter()
        .map(|d| {
            if d.include_wildcard {
                format!("{} (+{})", d.name, d.wildcard_name())
            } else {
                d.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn reuse_previous<P: Prompter + ?Sized>(prompter: &mut P, last: &LastRun) -> std::io::Result<bool> {
    output::step(&format!("Domains: {}", describe_domains(last)));
    output::step(&format!(
        "Files: {} / {}",
        last.cert_filename, last.key_filename
    ));
    output::step(&format!("Directories: {}", display_paths(&last.directories)));
    prompter.confirm("Reuse the previous domains and destinations?", true)
}

fn inputs_from_history(
    planner: &DistributionPlanner,
    last: &LastRun,
) -> marzcert_core::Result<ReissueInputs> {
    let domains = DomainCollector::from_entries(last.domains.clone())?;
    let directories: Vec<String> = last
        .directories
        .iter()
        .map(|dir| dir.display().to_string())
        .collect();
    let plan = planner.plan(
        false,
        Some((last.cert_filename.as_str(), last.key_filename.as_str())),
        Some(directories.as_slice()),
    );
    Ok(ReissueInputs { domains, plan })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marzcert_core::{DomainEntry, ScriptedPrompter};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn last_run() -> LastRun {
        LastRun {
            domains: vec![
                DomainEntry::new("example.com", true),
                DomainEntry::new("panel.example.net", false),
            ],
            cert_filename: "fullchain.crt".to_string(),
            key_filename: "private.key".to_string(),
            directories: vec![PathBuf::from("/srv/tls"), PathBuf::from("/opt/node/certs")],
        }
    }

    fn planner() -> DistributionPlanner {
        DistributionPlanner::new(
            "cert.pem",
            "key.pem",
            vec![
                PathBuf::from("/var/lib/marzneshin/certs"),
                PathBuf::from("/var/lib/marznode/certs"),
            ],
        )
    }

    #[test]
    fn history_inputs_keep_recorded_choices() {
        let inputs = inputs_from_history(&planner(), &last_run()).unwrap();
        assert_eq!(inputs.domains, last_run().domains);
        assert_eq!(inputs.plan.cert_filename, "fullchain.crt");
        assert_eq!(inputs.plan.key_filename, "private.key");
        assert_eq!(inputs.plan.directories, last_run().directories);
        assert!(!inputs.plan.fell_back_to_defaults);
    }

    #[test]
    fn history_without_directories_falls_back_to_defaults() {
        let mut last = last_run();
        last.directories.clear();
        let inputs = inputs_from_history(&planner(), &last).unwrap();
        assert_eq!(inputs.plan.directories, planner().default_directories());
        assert!(inputs.plan.fell_back_to_defaults);
    }

    #[test]
    fn history_without_domains_is_rejected() {
        let mut last = last_run();
        last.domains.clear();
        assert!(inputs_from_history(&planner(), &last).is_err());
    }

    #[test]
    fn describes_wildcards_inline() {
        assert_eq!(
            describe_domains(&last_run()),
            "example.com (+*.example.com), panel.example.net"
        );
    }

    #[test]
    fn reuse_defaults_to_yes() {
        let mut prompter = ScriptedPrompter::new([""]);
        assert!(reuse_previous(&mut prompter, &last_run()).unwrap());

        let mut prompter = ScriptedPrompter::new(["n"]);
        assert!(!reuse_previous(&mut prompter, &last_run()).unwrap());
    }

    #[test]
    fn panel_env_is_only_touched_when_present() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings {
            panel_env_path: temp.path().join(".env"),
            ..Settings::default()
        };
        assert!(existing_panel_env(&settings).is_none());

        std::fs::write(&settings.panel_env_path, "PORT = \"8000\"\n").unwrap();
        let update = existing_panel_env(&settings).unwrap();
        assert_eq!(update.path, settings.panel_env_path);
        assert_eq!(update.port, None);
        assert_eq!(update.dashboard_path, None);

        settings.panel_env_path = temp.path().to_path_buf();
        assert!(existing_panel_env(&settings).is_none());
    }
}
