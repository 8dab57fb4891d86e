use crate::{
    AppState,
    handlers::{tasks, users},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Account management and operational jobs. Every handler here takes the `SuperUser`
/// extractor, which rejects inactive or non-superuser callers with 403.
///
/// `/users/{id}` also exists in the authenticated router (GET); the two method routers
/// are merged by axum.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /users
        .route("/users", get(users::list_users).post(users::create_user))
        // PUT /users/{id}
        .route("/users/{id}", put(users::update_user))
        // POST /users/{id}/activate, /users/{id}/deactivate
        // Users are never hard-deleted; deactivation is the removal mechanism.
        .route("/users/{id}/activate", post(users::activate_user))
        .route("/users/{id}/deactivate", post(users::deactivate_user))
        // POST /tasks/notifications/batch
        .route(
            "/tasks/notifications/batch",
            post(tasks::send_batch_notifications),
        )
        // POST /tasks/maintenance/cleanup
        .route("/tasks/maintenance/cleanup", post(tasks::trigger_cleanup))
}
