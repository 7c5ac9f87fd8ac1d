//! # API REST
//!
//! REST API implementation for attic.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Basic authentication through the [`AuthenticatedUser`] extractor
//! - Per-client rate limiting and cross-site request refusal
//! - OpenAPI documentation
//! - REST-specific concerns (status mapping, body limits, security headers)
//!
//! Uses `api-shared` for response types and `attic-core` for configuration and access control.

#![warn(rust_2018_idioms)]

mod auth;
mod csrf;
mod error;
mod handlers;
mod rate_limit;

pub use auth::AuthenticatedUser;
pub use error::ApiError;
pub use handlers::UPLOAD_FIELD;
pub use rate_limit::ClientRateLimiter;

use api_shared::{ErrorRes, FileEntry, HealthRes, ListFilesRes, UploadRes};
use attic_core::{AccessGate, RateLimits};
use attic_files::FileStore;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Room for multipart boundaries and part headers on top of the per-file cap.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// How often idle clients are dropped from the rate limiter.
const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub gate: Arc<AccessGate>,
    pub limiter: Arc<ClientRateLimiter>,
}

impl AppState {
    pub fn new(store: FileStore, gate: AccessGate, rate_limits: RateLimits) -> Self {
        Self {
            store: Arc::new(store),
            gate: Arc::new(gate),
            limiter: Arc::new(ClientRateLimiter::new(rate_limits)),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_files,
        handlers::upload,
        handlers::download,
        handlers::delete,
    ),
    components(schemas(HealthRes, FileEntry, ListFilesRes, UploadRes, ErrorRes)),
    modifiers(&BasicAuthScheme)
)]
pub struct ApiDoc;

struct BasicAuthScheme;

impl Modify for BasicAuthScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

/// Builds the full router with state, body limit and response headers applied.
///
/// Everything but `/health` is rate limited per client and refuses cross-site writes.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .store
        .limits()
        .max_file_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ));

    let guarded = Router::new()
        .route("/", get(handlers::list_files))
        .route("/files", get(handlers::list_files))
        .route("/upload", post(handlers::upload))
        .route("/download/:name", get(handlers::download))
        .route("/delete/:name", post(handlers::delete))
        .route("/files/:name", delete(handlers::delete))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .route_layer(middleware::from_fn(csrf::reject_cross_site))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_requests,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(guarded)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(security_headers)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `addr` and serves the API until the process stops.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ Starting attic REST on {}", listener.local_addr()?);

    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        let mut sweep = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        loop {
            sweep.tick().await;
            limiter.retain_recent();
        }
    });

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
