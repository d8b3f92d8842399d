//! # Keystead API Server
//!
//! Authentication, session rotation and role-gated account management for a
//! multi-tenant account API.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=... DATA_ENCRYPTION_KEY=... cargo run -p keystead-api
//! ```
//!
//! Without `DATABASE_URL` the server keeps everything in memory.

use keystead_api::{
    app::{build_router, AppState},
    config::Config,
};
use keystead_shared::{
    auth::jwt::TokenIssuer,
    crypto::{AesGcmCrypto, DataCrypto},
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{create_pool, DatabaseConfig},
    },
    email::{EmailSender, HttpEmailSender, LogEmailSender},
    services::Services,
    store::{MemoryStore, PostgresStore, Store},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keystead_api=debug,keystead_shared=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Keystead API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database {
        Some(database) => {
            ensure_database_exists(&database.url).await?;
            let pool = create_pool(DatabaseConfig {
                url: database.url.clone(),
                max_connections: database.max_connections,
                ..DatabaseConfig::default()
            })
            .await?;
            run_migrations(&pool).await?;
            Arc::new(PostgresStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let crypto: Arc<dyn DataCrypto> = Arc::new(AesGcmCrypto::from_secret(&config.crypto.data_key));

    let email: Arc<dyn EmailSender> = match &config.email.relay_url {
        Some(relay_url) => Arc::new(HttpEmailSender::new(relay_url.as_str(), config.email.from.as_str())?),
        None => {
            tracing::warn!("EMAIL_RELAY_URL not set; emails are written to the log");
            Arc::new(LogEmailSender)
        }
    };

    let services = Services::new(store, crypto, email, TokenIssuer::new(&config.jwt.secret));
    let bind_address = config.bind_address();
    let app = build_router(AppState::new(services, config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
