//! JSON API mirroring the HTML flow.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::{removal_cookie, session_cookie};
use crate::server::handlers::auth::EMPTY_CREDENTIALS_MESSAGE;
use crate::server::session::{welcome_message, ChatEntry, CurrentSession};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub show_sources: bool,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(EMPTY_CREDENTIALS_MESSAGE.to_string()));
    }

    let principal = state
        .auth
        .authenticate(&payload.username, &payload.password)
        .await?;
    let session = state.sessions.create(principal).await;

    let body = Json(json!({
        "token": session.token,
        "username": session.principal.username,
        "department": session.principal.department,
        "message": welcome_message(&session.principal.username),
    }));
    Ok((jar.add(session_cookie(session.token.clone())), body))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> impl IntoResponse {
    state.sessions.remove(&session.token).await;
    (
        jar.remove(removal_cookie()),
        Json(json!({ "status": "logged_out" })),
    )
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let department = session.principal.department;
    let answer = state.qa.ask(department, &payload.query).await?;

    let sources = if payload.show_sources {
        answer.sources
    } else {
        Vec::new()
    };

    state
        .sessions
        .append(
            &session.token,
            vec![
                ChatEntry::user(payload.query.trim()),
                ChatEntry::assistant(answer.text.clone())
                    .with_outcome(answer.outcome)
                    .with_sources(sources.clone()),
            ],
        )
        .await;

    Ok(Json(json!({
        "answer": answer.text,
        "outcome": answer.outcome,
        "department": department,
        "sources": sources,
    })))
}

pub async fn me(CurrentSession(session): CurrentSession) -> impl IntoResponse {
    Json(json!({
        "username": session.principal.username,
        "department": session.principal.department,
        "department_name": session.principal.department.display_name(),
        "created_at": session.created_at,
        "messages": session.messages,
    }))
}
