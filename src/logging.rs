//! Logging setup
//!
//! Everything goes to the configured log file through a non-blocking
//! appender; `--debug` mirrors it to stdout. The log file can be reopened
//! after external rotation: [`LogReopenHandle::reopen`] queues a request that
//! the writer applies before its next write, on the appender's worker thread.

use crate::config::Settings;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "cfgwatch=info";

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append-only log file that can be reopened on request.
pub struct ReopenableFile {
    path: PathBuf,
    file: File,
    requests: mpsc::Receiver<()>,
}

/// Cloneable handle that asks a [`ReopenableFile`] to reopen its path.
#[derive(Debug, Clone)]
pub struct LogReopenHandle {
    requests: mpsc::Sender<()>,
}

impl LogReopenHandle {
    /// Returns `false` if the writer is gone.
    pub fn reopen(&self) -> bool {
        self.requests.send(()).is_ok()
    }
}

impl ReopenableFile {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<(Self, LogReopenHandle)> {
        let path = path.into();
        let file = open_append(&path)?;
        let (tx, rx) = mpsc::channel();
        Ok((
            Self {
                path,
                file,
                requests: rx,
            },
            LogReopenHandle { requests: tx },
        ))
    }

    fn apply_pending_reopen(&mut self) {
        if self.requests.try_iter().count() == 0 {
            return;
        }

        let _ = self.file.flush();
        match open_append(&self.path) {
            Ok(file) => self.file = file,
            // The subscriber cannot log about its own sink.
            Err(e) => eprintln!(
                "Failed to reopen log file {}, keeping the old one: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Write for ReopenableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.apply_pending_reopen();
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Keeps the appender workers alive; dropping it flushes pending log lines.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    _console_guard: Option<WorkerGuard>,
    reopen: LogReopenHandle,
}

impl LoggingGuard {
    pub fn reopen_handle(&self) -> LogReopenHandle {
        self.reopen.clone()
    }
}

/// Install the global subscriber. Failing to open the log file is fatal.
pub fn init_logging(settings: &Settings) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Invalid log filter")?;

    let (log_file, reopen) = ReopenableFile::open(&settings.log_file)
        .with_context(|| format!("Error opening log file: {}", settings.log_file.display()))?;
    let (non_blocking_file, file_guard) = non_blocking(log_file);

    let (console_layer, console_guard) = if settings.debug {
        let (non_blocking_console, guard) = non_blocking(io::stdout());
        let layer = fmt::layer()
            .with_writer(non_blocking_console)
            .with_target(false)
            .with_ansi(true);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_target(true)
                .with_ansi(false),
        )
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        _console_guard: console_guard,
        reopen,
    })
}
