//! Item REST API Routes
//!
//! Handlers for creating, updating, removing, reprioritizing and listing
//! items. Mutations address an item through `?id=&project_id=`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    extractors::{ItemRef, ListParams, ProjectRef},
    services::ItemService,
    types::{CreateItemRequest, RemoveItemResponse, ReprioritizeRequest, UpdateItemRequest},
};

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared application state for item routes.
#[derive(Clone)]
pub struct ItemState {
    pub service: Arc<ItemService>,
}

impl ItemState {
    pub fn new(service: Arc<ItemService>) -> Self {
        Self { service }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::invalid_input(e.body_text()))
}

fn require_name(name: &str) -> ApiResult<()> {
    if name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }
    Ok(())
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/item/create - Create an item in a project
pub async fn create_item(
    State(state): State<Arc<ItemState>>,
    ProjectRef { project_id }: ProjectRef,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = json_body(payload)?;
    require_name(&req.name)?;

    let item = state.service.create(project_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /api/v1/item/update - Rename an item and replace its description
pub async fn update_item(
    State(state): State<Arc<ItemState>>,
    ItemRef { id, project_id }: ItemRef,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = json_body(payload)?;
    require_name(&req.name)?;

    let item = state
        .service
        .update(id, project_id, &req.name, req.description)
        .await?;
    Ok(Json(item))
}

/// DELETE /api/v1/item/remove - Flag an item as removed
pub async fn remove_item(
    State(state): State<Arc<ItemState>>,
    ItemRef { id, project_id }: ItemRef,
) -> ApiResult<impl IntoResponse> {
    let item = state.service.remove(id, project_id).await?;
    Ok(Json(RemoveItemResponse {
        id: item.id,
        project_id: item.project_id,
        removed: item.removed,
    }))
}

/// PATCH /api/v1/item/reprioritize - Move an item to a new priority
pub async fn reprioritize_item(
    State(state): State<Arc<ItemState>>,
    ItemRef { id, project_id }: ItemRef,
    payload: Result<Json<ReprioritizeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = json_body(payload)?;
    let affected = state
        .service
        .reprioritize(id, project_id, req.new_priority)
        .await?;
    Ok(Json(affected))
}

/// GET /api/v1/items/list - List a window of items
pub async fn list_items(
    State(state): State<Arc<ItemState>>,
    ListParams(window): ListParams,
) -> ApiResult<impl IntoResponse> {
    let page = state.service.list(window).await?;
    Ok(Json(page))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the item routes router.
pub fn create_router(service: Arc<ItemService>) -> Router {
    let state = Arc::new(ItemState::new(service));

    Router::new()
        .route("/item/create", post(create_item))
        .route("/item/update", patch(update_item))
        .route("/item/remove", delete(remove_item))
        .route("/item/reprioritize", patch(reprioritize_item))
        .route("/items/list", get(list_items))
        .with_state(state)
}
