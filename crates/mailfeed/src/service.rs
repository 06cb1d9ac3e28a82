//! Wiring the pipeline and the HTTP server together, and tearing them down.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mailfeed_core::{FeedRepository, FeedStore, Fetcher, MailboxWatcher};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::http;
use crate::rate_limit::RateLimiter;

/// Runs until ctrl-c or until the mailbox pipeline stops on its own.
///
/// # Errors
///
/// Startup failures, and a pipeline that stopped without being asked to.
pub async fn run(config: Config) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let db_path = config.db_path.to_string_lossy();
    let repo = FeedRepository::new(&db_path)
        .await
        .with_context(|| format!("opening database {db_path}"))?;

    let store = Arc::new(FeedStore::new(repo.clone(), config.link_base()));
    let feeds = store.hydrate().await.context("loading feeds")?;
    info!(feeds, db = %db_path, "feed store ready");

    let (mut watcher, cursor, session) =
        MailboxWatcher::establish(&config.server, &config.credentials)
            .await
            .with_context(|| format!("connecting to {}", config.server))?;

    // Capacity one: each send waits for the store, and extra IDLE pushes
    // collapse into the pending trigger.
    let (items_tx, items_rx) = mpsc::channel(1);
    let (trigger_tx, trigger_rx) = mpsc::channel(1);

    let consumer = tokio::spawn(Arc::clone(&store).consume(items_rx));
    let fetcher = Fetcher::new(session, cursor, repo, items_tx)
        .with_filter(config.recipient_filter());
    let mut fetch_task = tokio::spawn(fetcher.run(trigger_rx));
    if let Err(e) = watcher.watch(trigger_tx) {
        watcher.close().await;
        return Err(e).context("starting IDLE");
    }

    let limiter = Arc::new(RateLimiter::per_minute(config.rate_limit_per_minute));
    let app = http::router(Arc::clone(&store), limiter);
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    info!(addr = %listener.local_addr()?, "listening");

    let (stop_http, http_stopped) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = http_stopped.await;
        })
        .await
    });

    let mut fetch_result = None;
    tokio::select! {
        () = shutdown_signal() => info!("shutting down"),
        result = &mut fetch_task => {
            error!("mailbox pipeline stopped unexpectedly");
            fetch_result = Some(result);
        }
    }

    watcher.close().await;
    let stopped_early = fetch_result.is_some();
    let fetch_result = match fetch_result {
        Some(result) => result,
        None => fetch_task.await,
    };
    let pipeline_failed = match fetch_result {
        Ok(Ok(())) => stopped_early,
        Ok(Err(e)) => {
            error!(error = %e, "fetcher failed");
            true
        }
        Err(e) => {
            error!(error = %e, "fetcher task panicked");
            true
        }
    };

    let _ = stop_http.send(());
    match tokio::time::timeout(config.shutdown_grace, &mut server).await {
        Ok(Ok(Ok(()))) => info!("http server stopped"),
        Ok(Ok(Err(e))) => error!(error = %e, "http server failed"),
        Ok(Err(e)) => error!(error = %e, "http server task panicked"),
        Err(_) => {
            warn!(grace = ?config.shutdown_grace, "in-flight requests abandoned");
            server.abort();
        }
    }

    if let Err(e) = consumer.await {
        error!(error = %e, "store consumer panicked");
    }

    if pipeline_failed {
        bail!("mailbox pipeline stopped");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
