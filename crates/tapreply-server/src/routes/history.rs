use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tapreply_memory::Exchange;
use tapreply_schema::{Ack, ClearHistoryRequest};

use crate::state::AppState;

#[derive(Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub context: Option<String>,
    pub exchanges: Vec<Exchange>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clear_history", post(clear_history))
        .route("/history/{session_id}", get(get_history))
}

/// Routed in both deployments: history is recorded even when it is not fed to
/// the generator, so a client can always wipe it.
async fn clear_history(
    State(state): State<AppState>,
    Json(request): Json<ClearHistoryRequest>,
) -> Json<Ack> {
    state.engine.clear_history(&request.session_id).await;
    Json(Ack::ok())
}

async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionView> {
    let session = state.engine.history().session(&session_id).await;
    Json(match session {
        Some(session) => SessionView {
            session_id,
            context: Some(session.context),
            exchanges: session.exchanges,
        },
        None => SessionView {
            session_id,
            context: None,
            exchanges: Vec::new(),
        },
    })
}
