pub mod config;
pub mod input;
pub mod transport;

use crate::config::{ListenConfig, OpenmoteConfig};
use crate::input::input_handle::{ControlSignal, InputHandle};
use crate::transport::{FrameSource, UdpFrameSource, UnixFrameSource};
use color_eyre::Result;
use tracing::{info, trace, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = OpenmoteConfig::load_or_create().await?;

    info!("Initializing input transport: {:?}", config.listen);
    let source: Box<dyn FrameSource> = match &config.listen {
        ListenConfig::Udp { port } => Box::new(UdpFrameSource::bind(*port)?),
        ListenConfig::Unix { path } => Box::new(UnixFrameSource::bind_at(path)?),
    };

    let mut handle = InputHandle::spawn(source, Some(config.input_settings()));

    // Snapshot consumer. The hardware-report encoder attaches here; until it
    // does, trace the state stream for inspection.
    let mut snapshots = handle.subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            trace!("device snapshot: {:?}", *snapshots.borrow_and_update());
        }
    });

    match handle.wait_for_shutdown().await {
        Some(ControlSignal::Quit) => info!("Shutting down on quit request"),
        Some(ControlSignal::PowerOff) => info!("Shutting down on power-off request"),
        None => warn!("Input session ended without a shutdown signal"),
    }

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
