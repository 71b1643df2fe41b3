//! HTTP API handlers.

mod subscribe;

use crate::state::AppState;
use axum::{Router, routing::get};

/// Build the subscriber API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sse", get(subscribe::subscribe_sse))
        .route("/ws", get(subscribe::subscribe_ws))
}
