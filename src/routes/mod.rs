use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod maintenance;
pub mod payments;
pub mod properties;
pub mod reports;
pub mod tenants;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(properties::router())
        .merge(tenants::router())
        .merge(payments::router())
        .merge(maintenance::router())
        .merge(reports::router())
}
