//! HTML login and logout.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::core::security::{removal_cookie, session_cookie, session_token};
use crate::server::session::CurrentSession;
use crate::server::views;
use crate::state::AppState;

pub const EMPTY_CREDENTIALS_MESSAGE: &str = "Please enter both username and password";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn index(session: Option<CurrentSession>) -> Redirect {
    if session.is_some() {
        Redirect::to("/chat")
    } else {
        Redirect::to("/login")
    }
}

pub async fn login_form(session: Option<CurrentSession>) -> Response {
    if session.is_some() {
        return Redirect::to("/chat").into_response();
    }
    Html(views::login_page(None, "")).into_response()
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if form.username.trim().is_empty() || form.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Html(views::login_page(Some(EMPTY_CREDENTIALS_MESSAGE), &form.username)),
        )
            .into_response();
    }

    match state.auth.authenticate(&form.username, &form.password).await {
        Ok(principal) => {
            let session = state.sessions.create(principal).await;
            (jar.add(session_cookie(session.token)), Redirect::to("/chat")).into_response()
        }
        Err(err) => {
            if let ApiError::Upstream(detail) | ApiError::Internal(detail) = &err {
                tracing::warn!("Login could not be completed: {}", detail);
            }
            (
                err.status(),
                Html(views::login_page(Some(&err.public_message()), &form.username)),
            )
                .into_response()
        }
    }
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        if state.sessions.remove(&token).await {
            tracing::info!("Session logged out");
        }
    }
    (jar.remove(removal_cookie()), Redirect::to("/login"))
}
