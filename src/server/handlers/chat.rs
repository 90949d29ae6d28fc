//! HTML chat page.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::server::session::{ChatEntry, CurrentSession};
use crate::server::views;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub query: String,
    /// Checkbox value; present only when ticked.
    pub show_sources: Option<String>,
}

pub async fn chat_page(session: Option<CurrentSession>) -> Response {
    match session {
        Some(CurrentSession(session)) => Html(views::chat_page(&session, None)).into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

pub async fn chat_submit(
    State(state): State<Arc<AppState>>,
    session: Option<CurrentSession>,
    Form(form): Form<ChatForm>,
) -> Response {
    let Some(CurrentSession(session)) = session else {
        return Redirect::to("/login").into_response();
    };
    let principal = &session.principal;
    let show_sources = form.show_sources.is_some();

    let reply = match state.qa.ask(principal.department, &form.query).await {
        Ok(answer) => {
            let entry = ChatEntry::assistant(answer.text).with_outcome(answer.outcome);
            if show_sources {
                entry.with_sources(answer.sources)
            } else {
                entry
            }
        }
        Err(ApiError::BadRequest(message)) => {
            return (
                StatusCode::BAD_REQUEST,
                Html(views::chat_page(&session, Some(&message))),
            )
                .into_response();
        }
        Err(err) => {
            tracing::warn!(
                "Query from '{}' ({}) failed: {}",
                principal.username,
                principal.department,
                err
            );
            ChatEntry::assistant(err.public_message())
        }
    };

    state
        .sessions
        .append(
            &session.token,
            vec![ChatEntry::user(form.query.trim()), reply],
        )
        .await;

    Redirect::to("/chat").into_response()
}
