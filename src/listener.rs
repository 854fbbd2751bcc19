//! Accept loop: one client at a time, forever.

use crate::config::RelayConfig;
use crate::error::Result;
use crate::session::Session;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Bind the listen socket and serve forever.
///
/// Only the bind itself can fail; everything after is handled in-loop.
pub async fn run(config: RelayConfig, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, endpoints = config.endpoints.len(), "listening for tracker connections");
    serve(listener, config).await;
    Ok(())
}

/// Accept one connection at a time and run its session to termination.
///
/// An accept that times out or fails is logged and the loop keeps waiting;
/// a session ending is logged with the remote address and its cause. No
/// session-level failure ever escapes this loop.
pub async fn serve(listener: TcpListener, config: RelayConfig) {
    loop {
        let (client, peer) = match timeout(config.accept_timeout(), listener.accept()).await {
            Err(_) => {
                debug!("no client within the accept window");
                continue;
            }
            Ok(Err(err)) => {
                error!(%err, "accept failed");
                continue;
            }
            Ok(Ok(conn)) => conn,
        };
        info!(%peer, "client connected");

        match Session::connect(client, &config).await {
            Err(err) => error!(%peer, %err, "session setup failed"),
            Ok(session) => {
                let cause = session.run().await;
                info!(%peer, %cause, "session ended");
            }
        }
    }
}
