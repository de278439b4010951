use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use dbsync_core::DbsyncConfig;
use dbsync_couch::{CouchClient, HttpProbe};
use dbsync_scheduler::Replicator;

mod app;
mod http;

/// Keeps a set of databases replicated from a source to a target store.
#[derive(Debug, Parser)]
#[command(name = "dbsync-gateway", version)]
struct Args {
    /// Config file (.toml or .json). Falls back to DBSYNC_CONFIG, then ./dbsync.toml.
    #[arg(short, long)]
    config: Option<String>,

    /// Port for the HTTP server (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Initial log level; RUST_LOG takes precedence.
    #[arg(short, long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = &args.log;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "dbsync_gateway={level},dbsync_scheduler={level},dbsync_couch={level},dbsync_core={level},tower_http={level}"
                )
                .into()
            }),
        )
        .init();

    // config errors are fatal: nothing can be replicated without endpoints
    let mut config = DbsyncConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    let timeout = config.http.request_timeout();
    let store = Arc::new(CouchClient::new(config.target_endpoint(), timeout)?);
    let probe = Arc::new(HttpProbe::new(timeout)?);
    let replicator = Replicator::from_config(&config, store, probe)?;

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, replicator.clone()));
    let router = app::build_router(state);

    // spawn the interval loop; it waits at the connection gate first
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scheduler = tokio::spawn(replicator.run(shutdown_rx));

    info!("dbsync gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let mut server_shutdown = shutdown_tx.subscribe();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });

    // whichever stops first takes the other down with it
    let outcome: anyhow::Result<()> = tokio::select! {
        res = &mut server => match res {
            Ok(Ok(())) => Err(anyhow::anyhow!("http server stopped unexpectedly")),
            Ok(Err(e)) => Err(anyhow::anyhow!("http server failure: {e}")),
            Err(e) => Err(anyhow::anyhow!("http server task failed: {e}")),
        },
        res = &mut scheduler => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::anyhow!("replicator failure: {e}")),
            Err(e) => Err(anyhow::anyhow!("replicator task failed: {e}")),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(true);
    if !server.is_finished() {
        let _ = server.await;
    }
    if !scheduler.is_finished() {
        let _ = scheduler.await;
    }

    if let Err(e) = &outcome {
        error!(error = %e, "dbsync gateway exiting");
    }
    outcome
}
