mod admin;
mod collections;
mod health;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the full route table, grounded in the teacher's `control::routes`
/// module layout (one `async fn` per route, wired up in a single `Router`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::health_check))
        .route("/collections", get(collections::list_collections))
        .route("/collections/:name", post(collections::ingest).get(collections::query))
        .route(
            "/collections/:name/policies",
            get(admin::list_policies).post(admin::create_policy),
        )
        .route("/collections/:name/policies/:id", get(admin::get_policy))
        .route("/collections/:name/rules", get(admin::list_rules).post(admin::create_rule))
        .route("/collections/:name/rules/:id", delete(admin::delete_rule))
}
