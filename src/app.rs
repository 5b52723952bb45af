use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/devices", get(handlers::list_devices))
        .route("/api/series/:device", get(handlers::get_series))
        .route(
            "/api/meta/:device/:period/:index",
            get(handlers::get_meta).put(handlers::put_meta),
        )
        .route(
            "/api/activation-meta/:device/:period/:index",
            get(handlers::get_activation_meta).put(handlers::put_activation_meta),
        )
        .route("/api/goal/:device", get(handlers::get_goal).put(handlers::put_goal))
        .route("/api/refresh", post(handlers::refresh))
        .with_state(state)
}
