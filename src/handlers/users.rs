use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{ActiveUser, SuperUser},
    error::{AppError, ErrorBody},
    models::{CreateUserRequest, Pagination, UpdateMeRequest, UpdateUserRequest, User},
};

/// read_me
///
/// [Authenticated Route] Returns the caller's own account.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn read_me(ActiveUser(user): ActiveUser) -> Json<User> {
    Json(user)
}

/// update_me
///
/// [Authenticated Route] Self-service update of name and password. The privilege
/// flags cannot be changed through this endpoint.
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 422, description = "Weak password", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_me(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    payload: Result<Json<UpdateMeRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(payload) = payload?;
    let updated = state.users.update_me(&user, payload).await?;
    Ok(Json(updated))
}

/// read_user
///
/// [Authenticated Route] Regular users may only fetch themselves; superusers anyone.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 403, description = "Not enough permissions", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn read_user(
    ActiveUser(actor): ActiveUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<User>, AppError> {
    let Path(id) = id?;
    let user = state.users.get_visible(id, &actor).await?;
    Ok(Json(user))
}

/// list_users
///
/// [Admin Route] Paginated listing of every account, including inactive ones.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(Pagination),
    responses(
        (status = 200, description = "Users", body = [User]),
        (status = 403, description = "Not a superuser", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    SuperUser(_admin): SuperUser,
    State(state): State<AppState>,
    pagination: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Vec<User>>, AppError> {
    let Query(pagination) = pagination?;
    let users = state.users.list(pagination).await?;
    Ok(Json(users))
}

/// create_user
///
/// [Admin Route] Creates an account with explicit `is_active` / `is_superuser` flags.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = User),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    SuperUser(admin): SuperUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(payload) = payload?;
    let user = state.users.create_user(payload).await?;
    tracing::info!(user_id = %user.id, admin = %admin.id, "user created by superuser");
    Ok(Json(user))
}

/// update_user
///
/// [Admin Route] Updates any account. A changed email is re-checked for uniqueness and
/// a new password is re-hashed.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    SuperUser(admin): SuperUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let user = state.users.admin_update(id, payload, &admin).await?;
    Ok(Json(user))
}

/// activate_user
///
/// [Admin Route] Re-enables a deactivated account.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/activate",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Activated user", body = User),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn activate_user(
    SuperUser(admin): SuperUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<User>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.users.activate(id, &admin).await?))
}

/// deactivate_user
///
/// [Admin Route] Disables an account. Existing tokens for it stop being accepted by
/// every auth policy on the next request.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/deactivate",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deactivated user", body = User),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn deactivate_user(
    SuperUser(admin): SuperUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<User>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.users.deactivate(id, &admin).await?))
}
