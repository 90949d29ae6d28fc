use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{api, auth, chat, health};
use crate::state::AppState;

/// Creates the application router.
///
/// HTML pages (`/login`, `/chat`, `/logout`) use the session cookie; the
/// `/api` routes accept the cookie or a bearer token.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(auth::index))
        .route("/login", get(auth::login_form).post(auth::login_submit))
        .route("/logout", post(auth::logout))
        .route("/chat", get(chat::chat_page).post(chat::chat_submit))
        .route("/health", get(health::health))
        .route("/api/login", post(api::login))
        .route("/api/logout", post(api::logout))
        .route("/api/query", post(api::query))
        .route("/api/me", get(api::me))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
