pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/profile", get(handlers::handle_profile_info))
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_end_session),
        )
        .route(
            "/api/v1/sessions/:id/messages",
            post(handlers::handle_submit_message),
        )
        .route(
            "/api/v1/sessions/:id/audio",
            get(handlers::handle_latest_audio),
        )
        .with_state(state)
}
