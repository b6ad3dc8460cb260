//! Process bootstrap: the two listeners and the database in between.
//!
//! The realtime listener binds first and accepts connections while the database is still
//! connecting; the REST listener is only bound once the store is confirmed. A failed database
//! connection ends the run with an error.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::Request;
use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::{self, App, Listener};
use crate::assets::{AssetStorage, CloudinaryStorage};
use crate::config::AppConfig;
use crate::state::AppState;
use crate::store::{self, StoreHandle};

/// Runs both listeners until SIGINT/SIGTERM.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    run_until(config, shutdown_signal(), |_| {}).await
}

/// Runs both listeners until `shutdown` resolves or a listener fails.
///
/// # Arguments
///
/// * `config` - Validated configuration snapshot
/// * `shutdown` - Resolves when the process should stop
/// * `on_realtime` - Called with the realtime listener's bound address as soon as it accepts
///   connections, before the database is contacted
///
/// # Returns
///
/// * `Ok(())` - After a requested shutdown has drained both listeners
/// * `Err` - If a port cannot be bound, the database cannot be reached or a listener fails
pub async fn run_until<F, R>(config: AppConfig, shutdown: F, on_realtime: R) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
    R: FnOnce(SocketAddr) + Send,
{
    let assets = CloudinaryStorage::from_config(&config.assets);
    if assets.is_configured() {
        info!(cloud = assets.cloud_name(), "Asset storage configured");
    } else {
        warn!("Asset storage credentials missing; image URLs are disabled");
    }

    let state = AppState::new(config, Arc::new(assets), StoreHandle::new());
    let cancel = CancellationToken::new();
    let mut servers = JoinSet::new();
    tokio::pin!(shutdown);

    let realtime = bind(&state.config.server.host, state.config.server.realtime_port).await?;
    let realtime_addr = realtime.local_addr()?;
    info!("server running on PORT {}...", realtime_addr.port());
    servers.spawn(serve(realtime, app::build(state.clone(), Listener::Realtime), Listener::Realtime, cancel.clone()));
    on_realtime(realtime_addr);

    let connected = tokio::select! {
        res = store::connect(&state.config.database) => res,
        _ = &mut shutdown => {
            info!("Shutdown requested before the database connected");
            return drain(cancel, servers).await;
        }
    };
    let store = match connected {
        Ok(store) => store,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Database connection failed");
            cancel.cancel();
            return Err(e.context("database connection failed"));
        }
    };
    state.store.install(store);
    info!(database = %state.config.database.name, "Database connected");

    let rest = bind(&state.config.server.host, state.config.server.port).await?;
    info!("server running on PORT {}...", rest.local_addr()?.port());
    servers.spawn(serve(rest, app::build(state.clone(), Listener::Rest), Listener::Rest, cancel.clone()));

    tokio::select! {
        _ = &mut shutdown => {}
        Some(joined) = servers.join_next() => {
            cancel.cancel();
            joined.context("listener task panicked")??;
            return Err(anyhow::anyhow!("listener stopped unexpectedly"));
        }
    }
    drain(cancel, servers).await
}

async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {}:{}", host, port))
}

async fn serve(
    listener: TcpListener,
    app: App,
    which: Listener,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    // Path normalization wraps the router, so the service is served directly.
    let service = axum::ServiceExt::<Request>::into_make_service(app);
    axum::serve(listener, service)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .with_context(|| format!("{} listener failed", which.name()))
}

/// Signals graceful shutdown and waits for every listener to finish.
async fn drain(cancel: CancellationToken, mut servers: JoinSet<anyhow::Result<()>>) -> anyhow::Result<()> {
    cancel.cancel();
    while let Some(joined) = servers.join_next().await {
        joined.context("listener task panicked")??;
    }
    info!("Listeners stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler; waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping servers...");
}
