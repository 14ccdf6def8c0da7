//! jsadmit controller binary.
//!
//! Startup: flags → logging → config → cluster client → service object →
//! policy resources watched → HTTP served until SIGINT/SIGTERM → watches
//! stopped.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use jsadmit_controller::cli::Cli;
use jsadmit_controller::discovery::KubeDiscovery;
use jsadmit_controller::watch::KubeSource;
use jsadmit_controller::{app_state, config, router};
use jsadmit_core::error::{JsAdmitError, Result};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_filter()));
    fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        tracing::error!(code = e.code().as_str(), error = %e, "jsadmit-controller failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = config::load(cli.config.as_deref())?;
    cli.apply(&mut cfg)?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| JsAdmitError::BadConfig(format!("server.listen: {e}")))?;

    let client = kube::Client::try_default()
        .await
        .map_err(|e| JsAdmitError::Internal(format!("cluster client: {e}")))?;

    let state = app_state::AppState::new(
        cfg,
        Arc::new(KubeDiscovery::new(client.clone())),
        Arc::new(KubeSource::new(client)),
    );
    state.start().await?;

    let app = router::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| JsAdmitError::Internal(format!("bind {listen}: {e}")))?;
    tracing::info!(%listen, version = env!("CARGO_PKG_VERSION"), "jsadmit-controller serving");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| JsAdmitError::Internal(format!("server failed: {e}")));

    state.shutdown().await;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
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
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
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
    tracing::info!("shutdown requested");
}
