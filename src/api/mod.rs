// API module - HTTP endpoints

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod checkin;
pub mod events;
pub mod health;
pub mod middleware;
pub mod state;
pub mod students;

pub use state::AppState;

/// Builds the full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(students::router())
        .merge(events::router())
        .merge(checkin::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
