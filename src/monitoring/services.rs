//! Service Controller - systemd unit status and restart

use std::time::Duration;

use tokio::process::Command;

use tracing::{debug, warn};

use super::command::{run_with_timeout, CommandError};
use crate::types::ServiceStatusMap;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("invalid service name '{0}'")]
    InvalidName(String),
    #[error("{operation} of {service} timed out after {secs}s")]
    Timeout {
        operation: &'static str,
        service: String,
        secs: u64,
    },
    #[error("{operation} of {service} could not run: {source}")]
    Exec {
        operation: &'static str,
        service: String,
        #[source]
        source: CommandError,
    },
}

/// Result of a restart command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartOutput {
    /// Command exit status was success
    pub success: bool,
    /// Captured error text, empty on success
    pub stderr: String,
}

/// Query and restart services.
///
/// Calls block for at most `timeout`. A timed-out call is an error, never
/// retried here.
pub trait ServiceController: Send + Sync {
    fn is_active(&self, service: &str, timeout: Duration) -> Result<bool, ControllerError>;

    fn restart(&self, service: &str, timeout: Duration) -> Result<RestartOutput, ControllerError>;
}

/// Build the status map for this cycle. A failed status query counts as stopped.
pub fn collect_statuses(
    controller: &dyn ServiceController,
    services: &[String],
    timeout: Duration,
) -> ServiceStatusMap {
    services
        .iter()
        .map(|name| {
            let running = controller.is_active(name, timeout).unwrap_or_else(|e| {
                warn!(service = %name, "Status check failed: {}", e);
                false
            });
            (name.clone(), running)
        })
        .collect()
}

/// `systemctl` backed controller.
#[derive(Debug, Clone)]
pub struct SystemctlController {
    use_sudo: bool,
}

impl SystemctlController {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    fn command(&self, privileged: bool) -> Command {
        if privileged && self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.args(["-n", "systemctl"]);
            cmd
        } else {
            Command::new("systemctl")
        }
    }
}

/// Reject names systemctl would read as an option or pattern.
pub fn check_name(service: &str) -> Result<(), ControllerError> {
    let valid = !service.is_empty()
        && !service.starts_with('-')
        && service
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | ':' | '\\'));
    if valid {
        Ok(())
    } else {
        Err(ControllerError::InvalidName(service.to_string()))
    }
}

fn map_command_error(operation: &'static str, service: &str, err: CommandError) -> ControllerError {
    match err {
        CommandError::TimedOut { timeout, .. } => ControllerError::Timeout {
            operation,
            service: service.to_string(),
            secs: timeout.as_secs(),
        },
        other => ControllerError::Exec {
            operation,
            service: service.to_string(),
            source: other,
        },
    }
}

impl ServiceController for SystemctlController {
    fn is_active(&self, service: &str, timeout: Duration) -> Result<bool, ControllerError> {
        check_name(service)?;
        let mut cmd = self.command(false);
        cmd.args(["is-active", service]);
        let out = run_with_timeout(cmd, timeout)
            .map_err(|e| map_command_error("status check", service, e))?;
        let state = out.stdout.trim();
        debug!(service, state, "systemctl is-active");
        Ok(state == "active")
    }

    fn restart(&self, service: &str, timeout: Duration) -> Result<RestartOutput, ControllerError> {
        check_name(service)?;
        let mut cmd = self.command(true);
        cmd.args(["restart", service]);
        let out =
            run_with_timeout(cmd, timeout).map_err(|e| map_command_error("restart", service, e))?;
        Ok(RestartOutput {
            success: out.success(),
            stderr: out.stderr.trim().to_string(),
        })
    }
}
