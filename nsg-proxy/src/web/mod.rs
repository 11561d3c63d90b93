//! HTTP surface of the proxy.
//!
//! Every `POST` route follows the same pipeline:
//!
//! ```text
//! classify → resolve endpoint → forward (→ fallback on 404) → normalize → respond
//! ```
//!
//! Failures at any step become a JSON error envelope.

pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    chat, education_content, education_content_chat, generic_webhook, health, horizon,
    onboarding, role_menu, AppState, ChatMessage, HealthResponse,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/roles/:role/menu", get(role_menu))
        .route("/api/chat", post(chat))
        .route("/api/n8n", post(generic_webhook))
        .route("/api/nsg-horizon", post(horizon))
        .route("/api/nsg-education/content", post(education_content))
        .route("/api/nsg-education/onboarding", post(onboarding))
        .route(
            "/api/nsg-education/content/:content_id/chat",
            post(education_content_chat),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
