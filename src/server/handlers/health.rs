use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let user_store = match state.users.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!("User store health check failed: {}", err);
            "unreachable"
        }
    };

    let (index, total_chunks) = match state.rag_store.department_counts().await {
        Ok(counts) => {
            let total: usize = counts.iter().map(|c| c.chunks).sum();
            let mut departments = Map::new();
            for count in counts {
                departments.insert(
                    count.department.as_str().to_string(),
                    json!({ "chunks": count.chunks, "sources": count.sources }),
                );
            }
            (Value::Object(departments), Some(total))
        }
        Err(err) => {
            tracing::warn!("Index health check failed: {}", err);
            (Value::Null, None)
        }
    };

    let status = if user_store == "ok" && total_chunks.is_some() {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "user_store": user_store,
        "llm_configured": state.qa.llm_configured(),
        "embedding_model": state.embedding_model,
        "active_sessions": state.sessions.len().await,
        "total_chunks": total_chunks,
        "index": index,
    }))
}
