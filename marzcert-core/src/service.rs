//! Dependent panel service management.

use tracing::info;

use crate::error::ServiceReloadError;
use crate::process::CommandRunner;

pub trait ServiceManager {
    fn is_installed(&self) -> bool;
    fn restart(&self) -> Result<(), ServiceReloadError>;
}

/// Drives the panel's management script (`marzneshin restart`).
pub struct PanelService<'a> {
    runner: &'a dyn CommandRunner,
    command: String,
}

impl<'a> PanelService<'a> {
    pub fn new(runner: &'a dyn CommandRunner, command: impl Into<String>) -> Self {
        Self {
            runner,
            command: command.into(),
        }
    }

    fn restart_args() -> Vec<String> {
        // `-n` keeps the script from tailing logs after the restart.
        vec!["restart".to_string(), "-n".to_string()]
    }
}

impl ServiceManager for PanelService<'_> {
    fn is_installed(&self) -> bool {
        self.runner.exists(&self.command)
    }

    fn restart(&self) -> Result<(), ServiceReloadError> {
        let output = self
            .runner
            .run(&self.command, &Self::restart_args())
            .map_err(|source| ServiceReloadError::Spawn {
                program: self.command.clone(),
                source,
            })?;
        if !output.success() {
            return Err(ServiceReloadError::Failed {
                code: output.code.unwrap_or(-1),
                stderr: output.failure_reason(),
            });
        }
        info!(command = %self.command, "Panel service restarted");
        Ok(())
    }
}
