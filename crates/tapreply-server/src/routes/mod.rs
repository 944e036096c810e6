pub mod choices;
pub mod history;
pub mod suggest;

use axum::{routing::get, Json, Router};
use tapreply_schema::Ack;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(suggest::router())
        .merge(choices::router())
        .merge(history::router())
}

async fn health() -> Json<Ack> {
    Json(Ack::ok())
}
