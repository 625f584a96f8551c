use std::net::SocketAddr;
use std::sync::Arc;

use admission_gateway::build_router;
use admission_gateway::config::Args;
use admission_gateway::rate_limit::Limiter;
use admission_gateway::state::AppState;
use admission_gateway::sweeper::Sweeper;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("admission_gateway=info")),
        )
        .init();

    let args = Args::parse();
    let sweep_every = args.sweep_interval()?;

    let limiter = Arc::new(Limiter::new(args.limiter_config())?.with_name("admission"));
    let guard = match args.guard_config() {
        Some(config) => Some(Arc::new(Limiter::new(config)?.with_name("guard"))),
        None => None,
    };

    let mut sweepers = vec![Sweeper::spawn(limiter.clone(), sweep_every)];
    if let Some(guard) = &guard {
        sweepers.push(Sweeper::spawn(guard.clone(), sweep_every));
    }

    info!(
        max_tokens = args.max_tokens,
        refill_rate = args.refill_rate,
        idle_eviction_secs = args.idle_eviction_secs,
        "admission limiter configured"
    );
    if let Some(guard) = &guard {
        info!(
            max_tokens = guard.config().max_tokens,
            refill_rate = guard.config().refill_rate_per_sec,
            key_source = ?args.key_source,
            "admission API guarded"
        );
    }

    let state = Arc::new(AppState::new(limiter, guard, args.key_source));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    for sweeper in sweepers {
        sweeper.shutdown().await;
    }
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
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
