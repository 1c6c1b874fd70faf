//! Hearth automation hub server
//!
//! Main entry point: loads configuration, wires the program engine to the
//! event bus and a script host, and runs until a shutdown signal arrives.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hearth_bus::ProgramEventBus;
use hearth_programs::ProgramManager;
use hearth_script::NullScriptHost;

use config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Use HEARTH_CONFIG env var or default to ./hearth.yaml
    let config_path = std::env::var("HEARTH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("hearth.yaml"));

    let (config, load_error) = if config_path.exists() {
        match ServerConfig::load(&config_path) {
            Ok(config) => (config, None),
            Err(e) => (ServerConfig::default(), Some(e)),
        }
    } else {
        (ServerConfig::default(), None)
    };

    let level = config.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Hearth program engine");
    if let Some(e) = load_error {
        warn!("Failed to load configuration: {}. Using defaults.", e);
    }

    let bus = Arc::new(ProgramEventBus::with_capacity(config.bus_capacity));
    let manager = ProgramManager::new(
        bus.clone(),
        Arc::new(NullScriptHost),
        config.programs_dir.clone(),
    );

    // Bridge published program events into the log until a hub-side
    // ModuleBus consumer takes over.
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(
                address = %event.address,
                property = %event.property,
                value = %event.value,
                "Program event"
            );
        }
    });

    info!(
        programs_dir = %config.programs_dir.display(),
        programs = manager.count(),
        "Program engine ready"
    );

    // Run until shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    manager.stop_all().await;
    info!("Program engine stopped");

    Ok(())
}
