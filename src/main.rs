mod config;
mod db;
mod errors;
mod logging;
mod models;
mod pipeline;
mod services;
#[cfg(test)]
mod test_support;
mod utils;

use tokio::sync::watch;

use crate::config::BootstrapConfig;
use crate::errors::Result;
use crate::pipeline::Bootstrapper;
use crate::services::{DownloadControl, LaunchRequestSlot};
use crate::utils::instance_lock::InstanceLock;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        tracing::error!("bootstrap failed: {}", error);
        eprintln!("rostrap: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = BootstrapConfig::from_env()?;
    logging::init(&config.log_dir)?;
    tracing::info!(
        "rostrap {} starting in {}",
        env!("CARGO_PKG_VERSION"),
        config.root_dir.display()
    );

    let _instance = InstanceLock::acquire(&config.lock_path())?;
    let db = db::init(&config.database_path())?;

    // The OS hands the custom-scheme URI over as an argument; anything else is ignored.
    let raw_uri = std::env::args()
        .skip(1)
        .find(|arg| arg.starts_with(&config.profile.url_scheme));
    let (launch_tx, launch_rx) = LaunchRequestSlot::channel();
    tokio::spawn(async move {
        LaunchRequestSlot::submit(launch_tx, raw_uri.as_deref());
    });

    let (control_tx, control_rx) = watch::channel(DownloadControl::Running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl-C, cancelling");
            let _ = control_tx.send(DownloadControl::Cancelled);
        }
    });

    let bootstrapper = Bootstrapper::new(config, db)?;
    let outcome = bootstrapper.run(launch_rx, control_rx).await?;
    tracing::info!(
        "launched {} from {}",
        outcome.record.installed_version_id,
        outcome.launched.executable.display()
    );
    Ok(())
}
