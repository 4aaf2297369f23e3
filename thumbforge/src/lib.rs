//! # thumbforge: credit-metered thumbnail generation
//!
//! `thumbforge` is the backend for a consumer thumbnail-generation product:
//! callers submit a face image, a style-inspiration image, an optional extra
//! image, and a prompt; the service calls a hosted image model, stores the
//! results in S3-compatible object storage, and meters usage through a
//! purchasable credit balance. Credits are topped up by checkout payments
//! the gateway delivers via webhook.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for all persistence.
//!
//! The **API layer** ([`api`]) exposes the generation endpoint, an explicit
//! credit debit, the stored-generation listing and deletion routes, and the
//! payment webhook. Handlers authenticate callers by verifying the hosted
//! auth provider's bearer JWTs ([`auth`]).
//!
//! The **database layer** ([`db`]) uses the repository pattern over sqlx.
//! Balance mutations are single conditional UPDATE statements, so two
//! concurrent requests can never both pass the sufficiency check and
//! overdraw an account.
//!
//! The **reservation flow** around generation is the core business logic:
//! validate ([`validation`]), rate-limit ([`limits`]), check and clamp
//! against the balance, call the provider ([`ai`]), persist artifacts
//! ([`storage`]), then debit the ledger. Storage failures degrade the
//! response (raw artifacts, no debit, reconciliation flag) instead of
//! failing the request.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use thumbforge::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = thumbforge::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     thumbforge::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```

pub mod ai;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod limits;
mod openapi;
pub mod storage;
pub mod stripe;
pub mod telemetry;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use bon::Builder;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::ai::GeminiClient;
use crate::limits::Limiters;
use crate::openapi::ApiDoc;
use crate::storage::{ArtifactStore, S3ArtifactStore};

pub use config::Config;
pub use types::{GenerationId, PaymentId, TransactionId, UserId};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub ai: Arc<GeminiClient>,
    pub store: Arc<dyn ArtifactStore>,
    pub limiters: Limiters,
}

/// Get the thumbforge database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    if config.cors.allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        origins.push(origin.parse::<HeaderValue>()?);
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials))
}

/// Build the application router with all endpoints and middleware.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(
            "/api-docs/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        )
        .route(
            "/generate",
            post(api::handlers::generate::generate).get(api::handlers::generate::status),
        )
        .route("/credits/decrement", post(api::handlers::credits::decrement))
        .route("/storage", get(api::handlers::storage::list_generations))
        .route("/storage/{id}", delete(api::handlers::storage::delete_generation))
        // Webhook route: no bearer auth, authenticated by event signature
        .route("/stripe/webhook", post(api::handlers::payments::webhook))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

/// The assembled application: connected pool, migrated schema, router.
pub struct Application {
    host: String,
    port: u16,
    router: Router,
}

impl Application {
    /// Connect to the configured database and assemble the application.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;

        Self::with_pool(config, pool).await
    }

    /// Assemble the application over an existing pool.
    pub async fn with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        migrator().run(&pool).await?;

        let ai = Arc::new(GeminiClient::new(&config.ai));
        let store: Arc<dyn ArtifactStore> = Arc::new(S3ArtifactStore::from_config(&config.storage).await);
        let limiters = Limiters::new(&config.limits);

        let host = config.host.clone();
        let port = config.port;

        let state = AppState::builder()
            .db(pool)
            .config(config)
            .ai(ai)
            .store(store)
            .limiters(limiters)
            .build();

        let router = build_router(state)?;

        Ok(Self { host, port, router })
    }

    /// Serve until the shutdown future resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        Ok(())
    }
}
