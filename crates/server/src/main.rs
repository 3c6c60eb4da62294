mod api;
mod config;
mod discovery;
mod range;
mod scan;
mod state;
mod streaming;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use api::api_router;
use config::{config_path_from_env, load_or_create_config, resolve_path};
use library::init_pool;
use remote::ProtocolConnector;
use scan::start_scan_all;
use state::AppState;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let database_path = resolve_path(&config_path, &config.database_path);
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let pool = init_pool(&database_path)?;
    info!("Catalog database at {:?}", database_path);

    let bind_addr = config.listen_addr();
    let scan_on_startup = config.scan_on_startup;
    let discovery = config.discovery_enabled.then(|| {
        (
            Duration::from_secs(config.discovery_browse_secs),
            Duration::from_secs(config.discovery_interval_secs),
        )
    });

    let state = AppState::new(&config_path, config, pool, Arc::new(ProtocolConnector));
    std::fs::create_dir_all(&state.artwork_dir)?;

    if scan_on_startup {
        match start_scan_all(&state) {
            Ok(summary) => info!("Startup scan: {} source(s) queued", summary.started),
            Err(err) => warn!("Startup scan failed: {}", err),
        }
    }
    if let Some((browse, interval)) = discovery {
        state.discovery.start(browse, interval);
    }

    let app = Router::new()
        .nest("/api", api_router(state))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
