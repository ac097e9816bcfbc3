pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod store;


use std::process;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use self::config::{ProgressLogConfig, StorageBackend};
use self::metrics::{handle_metrics, metrics, track_metrics};
use self::routes::{
    handle_all_logs, handle_create_log, handle_delete_logs, handle_get_logs, handle_health,
    handle_index, handle_method_not_allowed, handle_not_found,
};
use self::state::AppState;
use self::store::open_store;

/// Command-line overrides for `serve`. These win over the config file and
/// the environment.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub port: Option<u16>,
    pub hostname: Option<String>,
    pub storage: Option<StorageBackend>,
}

/// Build the application router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/log", post(handle_create_log))
        .route("/logs", get(handle_get_logs).delete(handle_delete_logs))
        .route("/logs/all", get(handle_all_logs))
        .fallback(handle_not_found)
        .method_not_allowed_fallback(handle_method_not_allowed)
        .layer(middleware::from_fn(track_metrics))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve configuration: defaults, then the TOML file, then the
/// environment, then CLI flags.
pub fn resolve_config(config_path: &str, args: ServeArgs) -> ProgressLogConfig {
    let mut config = ProgressLogConfig::load(config_path);
    config.apply_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(hostname) = args.hostname {
        config.server.hostname = hostname;
    }
    if let Some(storage) = args.storage {
        config.server.storage = storage;
    }
    config
}

pub async fn run_serve(config_path: &str, args: ServeArgs, log_filter: String) {
    let config = resolve_config(config_path, args);
    config.warn_insecure_defaults();

    let store = match open_store(&config.server) {
        Ok(store) => store,
        Err(e) => {
            eprintln!(
                "Failed to open {} storage: {}",
                config.server.storage.as_str(),
                e
            );
            process::exit(1);
        }
    };

    metrics()
        .storage_backend
        .with_label_values(&[store.backend()])
        .set(1);

    let state = Arc::new(AppState::new(
        store,
        config.server.delete_secret.clone(),
        log_filter,
    ));
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.hostname, config.server.port);
    match config.server.storage {
        StorageBackend::Csv => tracing::info!(
            "Serving progress log on http://{} (csv: {})",
            addr,
            config.server.csv_file
        ),
        StorageBackend::Document => tracing::info!(
            "Serving progress log on http://{} (document store: {})",
            addr,
            config.server.data_dir
        ),
        StorageBackend::Memory => {
            tracing::info!("Serving progress log on http://{} (in-memory)", addr)
        }
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Failed to bind to {}: {}", addr, e);
            process::exit(1);
        });

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    eprintln!("Failed to install SIGTERM handler: {}", e);
                    process::exit(1);
                }
            };

        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }

        #[cfg(not(unix))]
        ctrl_c.await.ok();

        tracing::info!("Shutdown signal received, finishing in-flight requests...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Server error: {}", e);
            process::exit(1);
        });

    tracing::info!("Server stopped");
}
