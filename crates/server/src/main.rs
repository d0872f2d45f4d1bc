//! Fulfillment server entry point.

use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use metrics_exporter_prometheus::PrometheusHandle;
use server::config::{Config, LogFormat};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Runs the core on `store` until a shutdown signal arrives.
async fn run<S: DocumentStore + Clone + 'static>(
    store: S,
    backend: &'static str,
    config: Config,
    metrics_handle: PrometheusHandle,
) {
    let state = server::create_default_state(store, backend, &config);

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(state.core.sweeper().run(shutdown.clone()));

    let app = server::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, backend, "starting fulfillment server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "expiry sweeper task failed");
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the document store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresDocumentStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            run(store, "postgres", config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, documents are kept in memory");
            run(InMemoryDocumentStore::new(), "memory", config, metrics_handle).await;
        }
    }
}
