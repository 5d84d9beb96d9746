//! Runtime settings
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! command-line flags. The result is validated once at startup and handed to
//! the watcher as an immutable [`Settings`] value.

use crate::error::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_DIR: &str = "/etc/nagios.sync";
pub const DEFAULT_TRIGGER_FILE: &str = "/tmp/nagios_config_fail";
pub const DEFAULT_INIT_FILE: &str = "/etc/init.d/nagios3";
pub const DEFAULT_LOG_FILE: &str = "/var/log/nagios_watcher.log";
pub const DEFAULT_REFRESH_MINUTES: u64 = 1;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Command-line flags
#[derive(Parser, Debug, Default)]
#[command(name = "cfgwatch")]
#[command(about = "Watch a config tree, validate edits, restart the service when valid", long_about = None)]
#[command(version)]
pub struct CliArgs {
    /// Optional TOML settings file (flags override its values)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the configuration tree to watch
    #[arg(long = "config-dir")]
    pub config_dir: Option<PathBuf>,

    /// Enable dry-run (validate and record, but never restart)
    #[arg(long = "dryrun")]
    pub dry_run: bool,

    /// Also log to the console
    #[arg(long)]
    pub debug: bool,

    /// Minutes to wait between validation passes
    #[arg(long = "refresh")]
    pub refresh_minutes: Option<u64>,

    /// Failure marker written when validation fails
    #[arg(long = "trigger")]
    pub trigger_file: Option<PathBuf>,

    /// Service init script used for the default validate/restart commands
    #[arg(long = "init-file")]
    pub init_file: Option<PathBuf>,

    /// Log file to append to
    #[arg(long = "logfile")]
    pub log_file: Option<PathBuf>,

    /// Validation command line (whitespace separated)
    #[arg(long = "validate-cmd")]
    pub validate_command: Option<String>,

    /// Restart command line (whitespace separated)
    #[arg(long = "restart-cmd")]
    pub restart_command: Option<String>,

    /// Seconds before a validate/restart command is abandoned
    #[arg(long = "command-timeout")]
    pub command_timeout_secs: Option<u64>,
}

/// Values read from the TOML settings file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub config_dir: Option<PathBuf>,
    pub dry_run: Option<bool>,
    pub debug: Option<bool>,
    pub refresh_minutes: Option<u64>,
    pub trigger_file: Option<PathBuf>,
    pub init_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub validate_command: Option<Vec<String>>,
    pub restart_command: Option<Vec<String>>,
    pub command_timeout_secs: Option<u64>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Loaded settings from: {}", path.display());
        Ok(settings)
    }
}

/// Fully resolved settings consumed by the watcher.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the watched configuration tree
    pub config_dir: PathBuf,
    /// Skip restarts, still validate and record failures
    pub dry_run: bool,
    /// Mirror the log to stdout
    pub debug: bool,
    /// Debounce period
    pub refresh: Duration,
    /// Failure marker location
    pub trigger_file: PathBuf,
    pub log_file: PathBuf,
    pub validate_command: Vec<String>,
    pub restart_command: Vec<String>,
    /// Upper bound on a single validate or restart invocation
    pub command_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(FileSettings::default(), &CliArgs::default())
    }
}

impl Settings {
    /// Parse flags, read the optional settings file and validate the result.
    pub fn from_cli(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileSettings::load(path)?,
            None => FileSettings::default(),
        };

        let settings = Self::resolve(file, cli);
        settings.validate()?;
        Ok(settings)
    }

    /// Layer defaults < file < flags. No validation happens here.
    pub fn resolve(file: FileSettings, cli: &CliArgs) -> Self {
        let init_file = cli
            .init_file
            .clone()
            .or(file.init_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INIT_FILE));
        let init_program = init_file.to_string_lossy().into_owned();

        let validate_command = cli
            .validate_command
            .as_deref()
            .map(split_command)
            .or(file.validate_command)
            .unwrap_or_else(|| vec![init_program.clone(), "checkconfig".to_string()]);

        let restart_command = cli
            .restart_command
            .as_deref()
            .map(split_command)
            .or(file.restart_command)
            .unwrap_or_else(|| vec![init_program, "restart".to_string()]);

        let refresh_minutes = cli
            .refresh_minutes
            .or(file.refresh_minutes)
            .unwrap_or(DEFAULT_REFRESH_MINUTES);

        let command_timeout_secs = cli
            .command_timeout_secs
            .or(file.command_timeout_secs)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);

        Self {
            config_dir: cli
                .config_dir
                .clone()
                .or(file.config_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            dry_run: cli.dry_run || file.dry_run.unwrap_or(false),
            debug: cli.debug || file.debug.unwrap_or(false),
            refresh: Duration::from_secs(refresh_minutes.saturating_mul(60)),
            trigger_file: cli
                .trigger_file
                .clone()
                .or(file.trigger_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRIGGER_FILE)),
            log_file: cli
                .log_file
                .clone()
                .or(file.log_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            validate_command,
            restart_command,
            command_timeout: Duration::from_secs(command_timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh.is_zero() {
            return Err(ConfigError::Invalid {
                field: "refresh",
                reason: "debounce period must be at least one minute".to_string(),
            });
        }
        if self.command_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "command_timeout",
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        if self.validate_command.is_empty() {
            return Err(ConfigError::Invalid {
                field: "validate_command",
                reason: "command is empty".to_string(),
            });
        }
        if self.restart_command.is_empty() {
            return Err(ConfigError::Invalid {
                field: "restart_command",
                reason: "command is empty".to_string(),
            });
        }
        Ok(())
    }
}

fn split_command(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
