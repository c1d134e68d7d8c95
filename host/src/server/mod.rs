use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::{server::api::create_router, ManagerState};

pub mod api;

/// Starts the manager HTTP server. Returns once the listener drains after
/// the state's shutdown token is cancelled.
pub async fn serve(state: ManagerState) -> anyhow::Result<()> {
    let addr = SocketAddr::from_str(&state.opts.address)
        .with_context(|| format!("invalid bind address {}", state.opts.address))?;
    let listener = TcpListener::bind(addr).await?;

    info!("listening on: {}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    let router = create_router().with_state(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server couldn't serve")?;

    Ok(())
}
