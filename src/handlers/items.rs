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
    auth::ActiveUser,
    error::{AppError, ErrorBody},
    models::{CreateItemRequest, Item, Pagination, UpdateItemRequest},
};

/// list_items
///
/// [Authenticated Route] Superusers see every item, everyone else only their own.
#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(Pagination),
    responses(
        (status = 200, description = "Items", body = [Item]),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "items"
)]
pub async fn list_items(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    pagination: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Vec<Item>>, AppError> {
    let Query(pagination) = pagination?;
    let items = state.items.list_visible(&user, pagination).await?;
    Ok(Json(items))
}

/// create_item
///
/// [Authenticated Route] Creates an item owned by the caller and enqueues its
/// processing job.
#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 200, description = "Item created", body = Item),
        (status = 422, description = "Invalid payload", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "items"
)]
pub async fn create_item(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<Json<Item>, AppError> {
    let Json(payload) = payload?;
    let item = state.items.create(payload, &user).await?;
    Ok(Json(item))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item", body = Item),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "items"
)]
pub async fn read_item(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Item>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.items.get(id, &user).await?))
}

/// update_item
///
/// [Authenticated Route] Owner or superuser only. The existence check runs before the
/// ownership check, so an unknown id is always 404.
#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Updated item", body = Item),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "items"
)]
pub async fn update_item(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<Item>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let item = state.items.update(id, payload, &user).await?;
    Ok(Json(item))
}

/// delete_item
///
/// [Authenticated Route] Owner or superuser only. Returns the removed item.
#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Deleted item", body = Item),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "items"
)]
pub async fn delete_item(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Item>, AppError> {
    let Path(id) = id?;
    let item = state.items.delete(id, &user).await?;
    Ok(Json(item))
}
