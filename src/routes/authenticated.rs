use crate::{
    AppState,
    handlers::{auth, items, tasks, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Endpoints for any signed-in user. Item handlers apply the owner-or-superuser rule
/// through the service layer.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /auth/test-token
        // Echoes the identity behind the bearer token.
        .route("/auth/test-token", post(auth::test_token))
        // GET/PUT /users/me
        .route("/users/me", get(users::read_me).put(users::update_me))
        // GET /users/{id}
        // Self only, unless the caller is a superuser.
        .route("/users/{id}", get(users::read_user))
        // GET/POST /items
        // Listing is scoped to the caller's own items for regular users.
        .route("/items", get(items::list_items).post(items::create_item))
        // GET/PUT/DELETE /items/{id}
        .route(
            "/items/{id}",
            get(items::read_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        // POST /tasks/reports/generate
        .route("/tasks/reports/generate", post(tasks::generate_report))
        // GET /tasks/jobs/{job_id}/status
        .route("/tasks/jobs/{job_id}/status", get(tasks::job_status))
        // GET /tasks/jobs/recent?limit=
        .route("/tasks/jobs/recent", get(tasks::recent_jobs))
        // GET /tasks/queue/info
        .route("/tasks/queue/info", get(tasks::queue_info))
}
