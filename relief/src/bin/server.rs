//! Relief server
//!
//! Serves the capacity-consistency engine over HTTP and WebSocket.
//!
//! # Usage
//!
//! ```bash
//! # In-memory store
//! cargo run --bin relief-server
//!
//! # PostgreSQL store
//! STORAGE_BACKEND=postgres DATABASE_URL=postgres://localhost/relief \
//!   cargo run --bin relief-server --features postgres
//! ```

use anyhow::Context as _;
use relief::{Application, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relief=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        address = %config.bind_address(),
        backend = ?config.storage.backend,
        metrics = config.metrics_enabled,
        "configuration loaded"
    );

    let app = Application::build(config)
        .await
        .context("failed to start relief server")?;
    app.run().await.context("relief server stopped with an error")?;
    Ok(())
}
