//! Category route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use clementine_core::{CategoryId, parse_id};

use crate::error::{AppError, Result};
use crate::middleware::CurrentAdmin;
use crate::models::Category;
use crate::services::CatalogService;
use crate::state::AppState;

/// Category routes, mounted under `/api/category`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/categories", get(list_categories))
        .route("/{id}", axum::routing::put(update_category).delete(delete_category))
}

// =============================================================================
// Wire Types
// =============================================================================

/// Category request body.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
}

/// Category response body.
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: CategoryId,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

fn category_id(raw: &str) -> Result<CategoryId> {
    parse_id(raw).ok_or_else(|| AppError::NotFound("Category not found".to_owned()))
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/category/categories - List all categories.
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryResponse>>> {
    let categories = CatalogService::new(state.pool()).list_categories().await?;

    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

/// POST /api/category - Create a category (admin).
pub async fn create_category(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>)> {
    let name = body
        .name
        .ok_or_else(|| AppError::Validation("Name is required".to_owned()))?;

    let category = CatalogService::new(state.pool())
        .create_category(&name)
        .await?;

    Ok((StatusCode::CREATED, Json(category.into())))
}

/// PUT /api/category/:id - Rename a category (admin).
pub async fn update_category(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<CategoryResponse>> {
    let id = category_id(&id)?;
    let name = body
        .name
        .ok_or_else(|| AppError::Validation("Name is required".to_owned()))?;

    let category = CatalogService::new(state.pool())
        .rename_category(id, &name)
        .await?;

    Ok(Json(category.into()))
}

/// DELETE /api/category/:id - Delete a category (admin).
///
/// Products referencing the category are left with a dangling reference;
/// deletion does not cascade.
pub async fn delete_category(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = category_id(&id)?;

    CatalogService::new(state.pool()).delete_category(id).await?;

    Ok(Json(json!({ "message": "Category deleted" })))
}
