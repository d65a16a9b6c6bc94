//! HTTP API layer exposing registration, sessions and document endpoints.

pub mod auth;
pub mod auth_middleware;
pub mod docs;
pub mod response;

pub use auth_middleware::{AuthContext, SESSION_COOKIE};
pub use response::{ApiError, Envelope};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use doc_hub_core::auth::{CredentialService, TokenVerifier};
use doc_hub_core::docs::DocumentService;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub docs: Arc<DocumentService>,
    pub credentials: Arc<CredentialService>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub admin_token: Arc<str>,
    /// Largest accepted request body in bytes.
    pub max_upload: usize,
    pub request_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    let max_upload = state.max_upload;
    let request_timeout = state.request_timeout;

    Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/auth", post(auth::login))
        .route("/api/auth/{token}", delete(auth::logout))
        .route("/api/docs", post(docs::upload).get(docs::list))
        .route("/api/docs/", get(docs::missing_id).delete(docs::missing_id))
        .route("/api/docs/{id}", get(docs::fetch).delete(docs::remove))
        .route("/health", get(|| async { "OK" }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .with_state(state)
}
