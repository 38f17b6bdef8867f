pub mod camera;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod input;
pub mod session;
pub mod sim;

use color_eyre::{eyre::eyre, Result};
use tokio::sync::oneshot;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::ControlConfig;
use crate::input::device::{DeviceCollector, InputDevice};
use crate::session::TickPilot;
use crate::sim::bridge::MqttBridge;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let mut config = ControlConfig::load();

    info!("Initializing input device");
    let device = DeviceCollector::create()
        .map_err(|e| eyre!("Failed to initialize input device: {}", e))?
        .initialize()
        .map_err(|e| eyre!("Failed to bring up input device: {}", e))?;

    config.mapping.resolve_clutch(device.axis_count());

    info!("Connecting to simulator bridge");
    let link = MqttBridge::connect(config.bridge.clone())
        .await
        .map_err(|e| eyre!("Failed to connect to simulator bridge: {}", e))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    let pilot = TickPilot::new(device, link, &config);
    pilot.run(shutdown_rx).await?;

    info!("Exiting simulation");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
