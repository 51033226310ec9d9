use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use auth_throttle::config::{Args, StoreBackend};
use auth_throttle::limiter::RateLimiter;
use auth_throttle::pruner::pruner;
use auth_throttle::state::AppState;
use auth_throttle::store::{MemoryStore, RecordStore, RestStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn RecordStore> = match args.store {
        StoreBackend::Memory => {
            warn!("using in-memory store, counters are per process and lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Rest => {
            let url = args
                .store_url
                .as_deref()
                .context("--store-url is required with --store rest")?;
            if args.store_key.is_empty() {
                warn!("no store key configured, requests will be anonymous");
            }
            info!(url, table = %args.store_table, "using REST record store");
            Arc::new(RestStore::new(
                url,
                args.store_key.clone(),
                &args.store_table,
                Duration::from_millis(args.store_timeout_ms),
            )?)
        }
    };

    // spawn the background pruner
    if args.prune_interval_secs > 0 {
        tokio::spawn(pruner(
            store.clone(),
            Duration::from_secs(args.prune_interval_secs),
            Duration::from_secs(args.retention_secs),
        ));
    }

    let limiter = RateLimiter::new(store, args.fail_mode, args.max_conflicts);
    let app = auth_throttle::app(Arc::new(AppState::new(limiter)));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, fail_mode = ?args.fail_mode, "auth-throttle listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
