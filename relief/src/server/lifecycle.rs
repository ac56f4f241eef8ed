//! Application startup and graceful shutdown.
//!
//! 1. **Startup**: open the storage backend, install metrics, wire services
//! 2. **Runtime**: serve HTTP and WebSocket traffic
//! 3. **Shutdown**: on Ctrl+C or SIGTERM stop accepting connections, close
//!    the event broadcaster so WebSocket streams end, then wait at most
//!    `SHUTDOWN_TIMEOUT` seconds for in-flight requests
//!
//! # Example
//!
//! ```rust,ignore
//! let app = Application::build(Config::from_env()).await?;
//! app.run().await?;
//! ```

use super::{AppState, build_router};
use crate::app::{Context, Services};
use crate::config::{Config, StorageBackend, StorageConfig};
use relief_core::environment::{SystemClock, UuidIdGenerator};
use relief_core::event_bus::EventBus;
use relief_core::store::{ShelterStore, StoreError};
use relief_runtime::metrics::MetricsError;
use relief_runtime::{EventBroadcaster, InMemoryShelterStore, PrometheusMetrics};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Why the server could not start or stopped abnormally.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The storage backend could not be opened
    #[error("storage backend unavailable: {0}")]
    Storage(#[from] StoreError),

    /// The backend was not compiled in
    #[error("storage backend '{0}' requires the `{0}` feature")]
    BackendDisabled(&'static str),

    /// The Prometheus recorder could not be installed
    #[error("metrics: {0}")]
    Metrics(#[from] MetricsError),

    /// The listener could not be bound
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Requested address
        address: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The HTTP server failed while running
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Open the configured storage backend.
///
/// # Errors
///
/// [`StartupError::Storage`] when the database cannot be reached or
/// migrated, [`StartupError::BackendDisabled`] when `postgres` is requested
/// without the feature.
#[allow(clippy::unused_async)]
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn ShelterStore>, StartupError> {
    match config.backend {
        StorageBackend::Memory => {
            warn!("using the in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryShelterStore::new()))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let store = relief_postgres::PostgresShelterStore::connect(
                &config.database_url,
                config.max_connections,
            )
            .await?;
            store.migrate().await?;
            info!(max_connections = config.max_connections, "connected to PostgreSQL");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => Err(StartupError::BackendDisabled("postgres")),
    }
}

/// Fully wired server, ready to run.
pub struct Application {
    listener: tokio::net::TcpListener,
    router: axum::Router,
    broadcaster: Arc<EventBroadcaster>,
    shutdown_timeout: Duration,
}

impl Application {
    /// Open storage, install metrics, wire services and bind the listener.
    ///
    /// # Errors
    ///
    /// Any [`StartupError`] except [`StartupError::Serve`].
    pub async fn build(config: Config) -> Result<Self, StartupError> {
        let store = open_store(&config.storage).await?;
        let broadcaster = Arc::new(EventBroadcaster::new(config.events.broadcast_capacity));
        let events: Arc<dyn EventBus> = broadcaster.clone();

        let metrics = if config.metrics_enabled {
            let metrics = PrometheusMetrics::install()?;
            crate::metrics::register_business_metrics();
            Some(metrics)
        } else {
            None
        };

        let context = Context::new(
            store,
            events,
            Arc::new(SystemClock),
            Arc::new(UuidIdGenerator),
            config.coordinator.retry_policy(),
        );
        let services = Services::new(context, config.stats.clone());
        let router = build_router(AppState::new(services, metrics));

        let address = config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind {
                address: address.clone(),
                source,
            })?;
        info!(%address, backend = ?config.storage.backend, "listener bound");

        Ok(Self {
            listener,
            router,
            broadcaster,
            shutdown_timeout: Duration::from_secs(config.server.shutdown_timeout),
        })
    }

    /// Serve until a shutdown signal, then drain.
    ///
    /// # Errors
    ///
    /// [`StartupError::Serve`] when the server fails.
    pub async fn run(self) -> Result<(), StartupError> {
        let timeout = self.shutdown_timeout;
        let stopping = Arc::new(Notify::new());
        let signal = {
            let stopping = Arc::clone(&stopping);
            let broadcaster = Arc::clone(&self.broadcaster);
            async move {
                shutdown_signal().await;
                info!("closing event streams");
                broadcaster.shutdown().await;
                stopping.notify_one();
            }
        };

        info!("HTTP server listening for requests");
        let server = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .into_future();
        let deadline = async {
            stopping.notified().await;
            tokio::time::sleep(timeout).await;
        };

        tokio::select! {
            result = server => result.map_err(StartupError::Serve)?,
            () = deadline => {
                warn!(?timeout, "shutdown timed out with requests in flight");
            }
        }

        info!("graceful shutdown complete");
        Ok(())
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}
