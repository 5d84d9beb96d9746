use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cfgwatch::logging::init_logging;
use cfgwatch::signals::spawn_signal_task;
use cfgwatch::{CliArgs, CommandSupervisor, ConfigWatcher, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();
    let settings = Settings::from_cli(&cli).context("Invalid settings")?;

    // A missing log sink is fatal
    let logging = init_logging(&settings)?;

    info!("🚀 Starting cfgwatch {}", env!("CARGO_PKG_VERSION"));
    info!("  Config dir: {}", settings.config_dir.display());
    info!("  Refresh: {:?}", settings.refresh);
    info!("  Failure marker: {}", settings.trigger_file.display());
    info!("  Validate: {}", settings.validate_command.join(" "));
    info!("  Restart: {}", settings.restart_command.join(" "));
    if settings.dry_run {
        info!("  Dry run: restarts are disabled");
    }

    let shutdown = CancellationToken::new();
    let supervisor = Arc::new(CommandSupervisor::from_settings(&settings));

    let watcher = match ConfigWatcher::new(settings, supervisor).start(shutdown.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };

    let signals = spawn_signal_task(
        watcher.control(),
        Some(logging.reopen_handle()),
        shutdown.clone(),
    );

    shutdown.cancelled().await;
    info!("Shutting down");

    watcher.join().await;
    let _ = signals.await;
    Ok(())
}
