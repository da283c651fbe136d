pub mod health;
pub mod realtime;
pub mod session;

use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};

use crate::middleware::request_id;
use crate::response::ErrorBody;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let session_routes = session::router().merge(realtime::router());

    Router::new()
        .nest("/session", session_routes)
        .nest("/health", health::router())
        .fallback(fallback_404)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn fallback_404(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new("NOT_FOUND", format!("No route for {}", uri.path()))),
    )
}
