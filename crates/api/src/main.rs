//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use application::saga_consumer;
use messaging::{Broker, InMemoryBroker, MessagingConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use storage::{InMemoryPartnershipStore, PartnershipStore, PostgresPartnershipStore};
use tokio::signal;
use tokio::sync::watch;
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

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    let messaging = MessagingConfig::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Connect the broker and pick the store
    let broker = Arc::new(InMemoryBroker::with_log_capacity(0));

    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresPartnershipStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL partnership store");
            serve(Arc::new(store), broker, config, messaging, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory partnership store");
            let store = Arc::new(InMemoryPartnershipStore::new());
            serve(store, broker, config, messaging, metrics_handle).await;
        }
    }
}

async fn serve<S, B>(
    store: Arc<S>,
    broker: Arc<B>,
    config: Config,
    messaging: MessagingConfig,
    metrics_handle: PrometheusHandle,
) where
    S: PartnershipStore + 'static,
    B: Broker,
{
    // 4. Build the service and start the saga consumers
    let state = api::create_state(store, broker.clone(), &config, &messaging);
    let outbox = state.service.outbox().clone();

    let consumers = saga_consumer(state.service.clone(), broker.clone(), &messaging)
        .start()
        .await;
    tracing::info!(workers = consumers.worker_count(), "saga consumers running");

    // 5. Start the outbox retry sweep
    let (stop_tx, stop_rx) = watch::channel(false);
    let sweep = tokio::spawn(api::sweep::run(
        outbox.clone(),
        config.outbox_retry_interval,
        stop_rx,
    ));

    // 6. Start server
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Drain: stop consuming, flush what is left, close broker handles
    consumers.stop().await;
    let _ = stop_tx.send(true);
    if let Err(e) = sweep.await {
        tracing::error!(error = %e, "outbox sweep panicked");
    }

    let report = outbox.retry_pending().await;
    if !report.is_complete() {
        tracing::warn!(
            deferred = report.deferred,
            "events still queued at shutdown"
        );
    }
    outbox.publisher().close().await;
    if let Err(e) = broker.close().await {
        tracing::warn!(error = %e, "failed to close broker");
    }

    tracing::info!("server shut down gracefully");
}
