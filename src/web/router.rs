use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::get,
};

use crate::{AppState, modules};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/healthz", get(healthz))
        .merge(modules::grader::router())
        .with_state(state)
}

async fn landing() -> Redirect {
    Redirect::to("/tools/grader")
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
