use crate::server::{app_state::AppState, handlers};
use axum::{
  routing::{any, get},
  Router,
};

pub fn create_router() -> Router<AppState> {
  Router::new()
    .route("/health", get(handlers::health_check))
    // every verb reaches the dispatcher, which rejects unsupported ones itself
    .route("/v1/resources/{provider}/{*path}", any(handlers::dispatch))
}
