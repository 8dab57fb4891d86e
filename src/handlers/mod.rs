//! HTTP handlers, grouped by resource. Authorization is declared in each handler's
//! signature through the extractors in [`crate::auth`].

pub mod auth;
pub mod items;
pub mod tasks;
pub mod users;

use axum::Json;

use crate::models::HealthResponse;

/// health
///
/// [Public Route] Liveness probe for load balancers and container orchestration.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
