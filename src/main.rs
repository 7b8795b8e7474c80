//! Tessera Shell - Desktop Shell Coordinator
//!
//! Client side of the tessera desktop: gives every output a panel, a
//! taskbar and a background, mirrors compositor-managed windows in the
//! taskbars, launches programs from the panel and shows the unlock dialog
//! when the compositor locks.

mod config;
mod desktop;
mod dispatch;
mod ipc;
mod output;
mod shell;
mod toolkit;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tessera_shell=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Tessera Shell");

    let config = config::Config::load()?;

    let socket = tessera_ipc::socket_path();
    let connection = ipc::Connection::connect(&socket).await?;
    info!("Connected to compositor at {:?}", socket);

    dispatch::EventLoop::new(&config, connection).run().await
}
