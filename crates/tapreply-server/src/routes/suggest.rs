use axum::{extract::State, routing::post, Json, Router};
use tapreply_schema::{SuggestRequest, SuggestResponse};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/suggest", post(suggest))
}

/// Always answers with a list; generator trouble shows up as phrase-bank
/// suggestions rather than an error status.
async fn suggest(
    State(state): State<AppState>,
    Json(request): Json<SuggestRequest>,
) -> Json<SuggestResponse> {
    let suggestions = state.engine.suggest(&request).await;
    Json(SuggestResponse { suggestions })
}
