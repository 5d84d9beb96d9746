//! Service supervisor: validate and restart the monitored service
//!
//! The watcher only knows two operations. [`CommandSupervisor`] implements
//! them by running configured external commands; tests substitute their own
//! implementation of [`ServiceSupervisor`].

use crate::config::Settings;
use crate::error::CommandError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    /// stdout followed by stderr, not interleaved
    pub output: Vec<u8>,
    /// Exit status was zero
    pub ok: bool,
}

impl CommandReport {
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

#[async_trait]
pub trait ServiceSupervisor: Send + Sync {
    /// Check the aggregated configuration without touching the running service.
    async fn validate(&self) -> Result<CommandReport, CommandError>;

    /// Restart the service so it picks up the configuration.
    async fn restart(&self) -> Result<CommandReport, CommandError>;
}

/// Supervisor backed by two external command lines.
#[derive(Debug, Clone)]
pub struct CommandSupervisor {
    validate_command: Vec<String>,
    restart_command: Vec<String>,
    timeout: Duration,
}

impl CommandSupervisor {
    pub fn new(validate_command: Vec<String>, restart_command: Vec<String>, timeout: Duration) -> Self {
        Self {
            validate_command,
            restart_command,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.validate_command.clone(),
            settings.restart_command.clone(),
            settings.command_timeout,
        )
    }

    async fn run(&self, command_line: &[String]) -> Result<CommandReport, CommandError> {
        let (program, args) = command_line.split_first().ok_or(CommandError::Empty)?;
        debug!("Running command: {}", command_line.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        // Dropping the future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => result.map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(CommandError::Timeout {
                    program: program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        Ok(CommandReport {
            output: combined,
            ok: output.status.success(),
        })
    }
}

#[async_trait]
impl ServiceSupervisor for CommandSupervisor {
    async fn validate(&self) -> Result<CommandReport, CommandError> {
        self.run(&self.validate_command).await
    }

    async fn restart(&self) -> Result<CommandReport, CommandError> {
        self.run(&self.restart_command).await
    }
}
