use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to start or extend watching of a directory.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch path does not exist: {0}")]
    PathMissing(PathBuf),

    #[error("Failed to watch {path}: {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Failed to walk directory tree under {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Failure to run one of the service commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command is empty")]
    Empty,

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Failure to read or change the on-disk failure marker.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("Failed to check failure marker {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write failure marker {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove failure marker {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid or unreadable settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
