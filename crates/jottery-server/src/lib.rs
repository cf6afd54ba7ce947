//! # jottery-server
//!
//! The Jottery sync server. It stores only opaque, client-encrypted blobs
//! and arbitrates ordering; no key ever reaches this process. Endpoints:
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | GET    | `/health` | no |
//! | POST   | `/api/v1/auth/register` | no |
//! | GET    | `/api/v1/sync/status` | bearer |
//! | POST   | `/api/v1/sync/push` | bearer |
//! | POST   | `/api/v1/sync/pull` | bearer |
//! | DELETE | `/api/v1/sync/notes/:id` | bearer |
//!
//! CORS is permissive by default and intended to be restricted at a
//! reverse proxy.

pub mod api;
pub mod config;
pub mod db;
pub mod error;

use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::sqlite::SqlitePool;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use config::Config;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
}

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically. Useful
/// for log correlation when chasing a sync conflict across requests.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

async fn health_check() -> &'static str {
    "OK"
}

/// Build the full application router.
///
/// Exposed so integration tests can mount the router on an ephemeral
/// listener.
pub fn app(state: AppState, config: &Config) -> Router {
    let sync_routes = Router::new()
        .route("/api/v1/sync/status", get(api::sync::get_status))
        .route("/api/v1/sync/push", post(api::sync::push))
        .route("/api/v1/sync/pull", post(api::sync::pull))
        .route("/api/v1/sync/notes/:id", delete(api::sync::delete_note))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/auth/register", post(api::auth::register))
        .merge(sync_routes)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(config.max_payload_size))
        .layer(RequestBodyLimitLayer::new(config.max_payload_size))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
