use axum::{extract::State, routing::post, Json, Router};
use tapreply_schema::{Ack, LogChoiceRequest};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/log_choice", post(log_choice))
}

async fn log_choice(
    State(state): State<AppState>,
    Json(request): Json<LogChoiceRequest>,
) -> Json<Ack> {
    tracing::debug!(
        session_id = %request.session_id,
        suggestion_id = %request.suggestion_id,
        "choice logged"
    );
    state
        .engine
        .record_choice(
            &request.session_id,
            &request.context,
            &request.intent,
            &request.text,
        )
        .await;
    Json(Ack::ok())
}
