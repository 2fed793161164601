//! Long-Poll Room Chat Server - Entry Point
//!
//! Loads configuration, binds the listener and runs the accept loop until
//! Ctrl-C.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_server::{serve, ChatServer, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_server=info")),
        )
        .init();

    let mut config = Config::from_env()?;
    // Optional `<port>` or `<host>:<port>` argument
    if let Some(arg) = env::args().nth(1) {
        config.apply_addr_arg(&arg)?;
    }

    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        "Chat server listening on {} ({} workers, history {}, poll timeout {:?})",
        addr, config.workers, config.history_capacity, config.poll_timeout
    );

    let server = Arc::new(ChatServer::new(config.room_settings()));
    serve(listener, server, &config, shutdown_signal()).await?;

    info!("Chat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
