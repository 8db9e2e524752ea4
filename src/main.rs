mod clients;
mod config;
mod error;
mod helpers;
mod lister;
mod models;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use clients::NodeService;
use clients::alerts::AlertFeed;
use lister::registry::NodeListRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<NodeListRegistry<NodeService>>,
    pub alerts: Arc<AlertFeed>,
    pub config: Arc<config::Config>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("node_console=info")),
        )
        .init();

    let config_path = std::env::args()
        .skip(1)
        .zip(std::env::args().skip(2))
        .find_map(|(k, v)| {
            if k == "-config" || k == "--config" {
                Some(v)
            } else {
                None
            }
        })
        .or_else(|| std::env::args().nth(1).filter(|a| !a.starts_with('-')))
        .unwrap_or_else(|| "/etc/node-console/config.yaml".to_string());

    let cfg = config::Config::load(&PathBuf::from(&config_path)).unwrap_or_else(|e| {
        eprintln!("error loading config: {}", e);
        std::process::exit(1);
    });

    let service = NodeService::new(&cfg.backend).unwrap_or_else(|e| {
        eprintln!("error creating backend client: {}", e);
        std::process::exit(1);
    });

    let alerts = Arc::new(AlertFeed::new(cfg.alert_history));
    let registry = Arc::new(NodeListRegistry::new(Arc::new(service), alerts.clone()));
    let cfg = Arc::new(cfg);

    // Close node lists nobody has looked at for a while
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    let reaper = tokio::spawn(registry.clone().run_reaper(cfg.idle_timeout(), shutdown_rx));

    let state = AppState {
        registry: registry.clone(),
        alerts,
        config: cfg.clone(),
    };

    let router = routes::build_router(state);

    let listen_addr = cfg.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {}", listen_addr, e);
        std::process::exit(1);
    });

    info!(backend = %cfg.backend.base_url, "node-console listening on {}", listen_addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(());
        })
        .await
    {
        eprintln!("server error: {}", e);
        std::process::exit(1);
    }

    let _ = reaper.await;
    registry.shutdown().await;
    info!("node lists closed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
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
