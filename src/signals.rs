//! Operator signal handling
//!
//! - `SIGUSR2`: dump the watch set to the log
//! - `SIGHUP`: reopen the log file (after rotation)
//! - `SIGINT` / `SIGTERM`: cancel the shutdown token
//!
//! The handlers only send messages; they never touch watcher state directly.

use crate::logging::LogReopenHandle;
use crate::watcher::TreeCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub fn spawn_signal_task(
    control: mpsc::UnboundedSender<TreeCommand>,
    log: Option<LogReopenHandle>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run(control, log, shutdown))
}

#[cfg(unix)]
async fn run(
    control: mpsc::UnboundedSender<TreeCommand>,
    log: Option<LogReopenHandle>,
    shutdown: CancellationToken,
) {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::{error, info, warn};

    let streams = (|| -> std::io::Result<_> {
        Ok((
            signal(SignalKind::user_defined2())?,
            signal(SignalKind::hangup())?,
            signal(SignalKind::terminate())?,
            signal(SignalKind::interrupt())?,
        ))
    })();

    let (mut usr2, mut hup, mut term, mut int) = match streams {
        Ok(streams) => streams,
        Err(e) => {
            error!("Failed to register signal handlers: {}", e);
            shutdown.cancelled().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = usr2.recv() => {
                info!("Dumping watchers: SIGUSR2");
                if control.send(TreeCommand::Dump).is_err() {
                    warn!("File system event task is not running");
                }
            }
            _ = hup.recv() => {
                match &log {
                    Some(handle) if handle.reopen() => info!("Reloading log file"),
                    Some(_) => warn!("Log writer is gone, cannot reopen"),
                    None => info!("SIGHUP ignored: no log file configured"),
                }
            }
            _ = term.recv() => {
                info!("Received SIGTERM");
                shutdown.cancel();
            }
            _ = int.recv() => {
                info!("Received SIGINT");
                shutdown.cancel();
            }
        }
    }
}

#[cfg(not(unix))]
async fn run(
    _control: mpsc::UnboundedSender<TreeCommand>,
    _log: Option<LogReopenHandle>,
    shutdown: CancellationToken,
) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            shutdown.cancel();
        }
    }
}
