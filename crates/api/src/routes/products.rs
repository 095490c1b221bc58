//! Product route handlers.
//!
//! Public catalog reads, admin catalog writes, and authenticated review
//! appends. Response bodies use the camelCase field names the client
//! expects (`countInStock`, `numReviews`, `hasMore`).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use clementine_core::{CategoryId, Patch, ProductId, UserId, parse_id};

use crate::error::{AppError, Result};
use crate::middleware::{CurrentAdmin, CurrentUser};
use crate::models::{Product, Review};
use crate::routes::categories::CategoryResponse;
use crate::routes::uploads;
use crate::services::CatalogService;
use crate::services::catalog::{CreateProduct, UpdateProduct};
use crate::state::AppState;

/// Product routes, mounted under `/api/products`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/allproducts", get(all_products))
        .route("/top", get(top_products))
        .route("/new", get(new_products))
        .route("/uploads", post(uploads::upload_image))
        .route("/filtered-products", post(filter_products))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/reviews", post(add_review))
}

// =============================================================================
// Wire Types
// =============================================================================

/// Query parameters for the paginated listing.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub keyword: Option<String>,
}

/// Product response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub image: String,
    pub price: Decimal,
    pub category: Option<CategoryResponse>,
    pub quantity: i32,
    pub count_in_stock: i32,
    pub rating: Decimal,
    pub num_reviews: i32,
    pub reviews: Vec<ReviewResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    fn new(product: Product, reviews: Vec<Review>) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            brand: product.brand,
            image: product.image,
            price: product.price,
            category: product.category.map(Into::into),
            quantity: product.quantity,
            count_in_stock: product.count_in_stock,
            rating: product.rating,
            num_reviews: product.num_reviews,
            reviews: reviews.into_iter().map(Into::into).collect(),
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self::new(product, Vec::new())
    }
}

/// Review response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: clementine_core::ReviewId,
    /// Reviewer display name, snapshotted at review time.
    pub name: String,
    pub rating: i32,
    pub comment: String,
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            name: review.reviewer_name,
            rating: review.rating,
            comment: review.comment,
            user: review.user_id,
            created_at: review.created_at,
        }
    }
}

/// Paginated listing response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPageResponse {
    pub products: Vec<ProductResponse>,
    pub page: i64,
    pub pages: i64,
    pub has_more: bool,
}

/// Create-product request body. Presence is validated by hand so a missing
/// field is answered with a 400 and a message, not a deserializer error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub image: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<CategoryId>,
    pub quantity: Option<i32>,
    pub count_in_stock: Option<i32>,
}

/// Update-product request body: tri-state per field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub brand: Patch<String>,
    #[serde(default)]
    pub image: Patch<String>,
    #[serde(default)]
    pub price: Patch<Decimal>,
    #[serde(default)]
    pub category: Patch<CategoryId>,
    #[serde(default)]
    pub quantity: Patch<i32>,
    #[serde(default)]
    pub count_in_stock: Patch<i32>,
}

/// Compound filter request body: category ids and an optional
/// `[min, max]` price pair.
#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub checked: Vec<CategoryId>,
    #[serde(default)]
    pub radio: Vec<Decimal>,
}

/// Review request body.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: Option<i32>,
    #[serde(default)]
    pub comment: String,
}

fn product_id(raw: &str) -> Result<ProductId> {
    parse_id(raw).ok_or_else(|| AppError::NotFound("Product not found".to_owned()))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| {
        AppError::Validation(format!(
            "Please fill all required fields: '{field}' is missing"
        ))
    })
}

// =============================================================================
// Public Reads
// =============================================================================

/// GET /api/products - One page of products, optionally keyword-filtered.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ProductPageResponse>> {
    let page = CatalogService::new(state.pool())
        .product_page(query.page.unwrap_or(1), query.keyword.as_deref())
        .await?;

    Ok(Json(ProductPageResponse {
        products: page.products.into_iter().map(Into::into).collect(),
        page: page.page,
        pages: page.pages,
        has_more: page.has_more,
    }))
}

/// GET /api/products/:id - A single product with category and reviews.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>> {
    let id = product_id(&id)?;
    let (product, reviews) = CatalogService::new(state.pool()).get_product(id).await?;

    Ok(Json(ProductResponse::new(product, reviews)))
}

/// GET /api/products/allproducts - The entire catalog, newest first.
pub async fn all_products(State(state): State<AppState>) -> Result<Json<Vec<ProductResponse>>> {
    let products = CatalogService::new(state.pool()).all_products().await?;

    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /api/products/top - The four highest-rated products.
pub async fn top_products(State(state): State<AppState>) -> Result<Json<Vec<ProductResponse>>> {
    let products = CatalogService::new(state.pool()).top_products().await?;

    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /api/products/new - The five most recently created products.
pub async fn new_products(State(state): State<AppState>) -> Result<Json<Vec<ProductResponse>>> {
    let products = CatalogService::new(state.pool()).new_products().await?;

    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// POST /api/products/filtered-products - Category and price-range filter.
pub async fn filter_products(
    State(state): State<AppState>,
    Json(body): Json<FilterRequest>,
) -> Result<Json<Vec<ProductResponse>>> {
    let products = CatalogService::new(state.pool())
        .filter_products(&body.checked, &body.radio)
        .await?;

    Ok(Json(products.into_iter().map(Into::into).collect()))
}

// =============================================================================
// Admin Writes
// =============================================================================

/// POST /api/products - Create a product (admin).
pub async fn create_product(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let input = CreateProduct {
        name: required(body.name, "name")?,
        description: required(body.description, "description")?,
        brand: required(body.brand, "brand")?,
        image: required(body.image, "image")?,
        price: required(body.price, "price")?,
        category: required(body.category, "category")?,
        quantity: required(body.quantity, "quantity")?,
        count_in_stock: body.count_in_stock,
    };

    let product = CatalogService::new(state.pool()).create_product(input).await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /api/products/:id - Partially update a product (admin).
///
/// Absent fields keep their stored value; explicit nulls are rejected.
pub async fn update_product(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>> {
    let id = product_id(&id)?;

    let update = UpdateProduct {
        name: body.name,
        description: body.description,
        brand: body.brand,
        image: body.image,
        price: body.price,
        category: body.category,
        quantity: body.quantity,
        count_in_stock: body.count_in_stock,
    };

    let product = CatalogService::new(state.pool())
        .update_product(id, update)
        .await?;

    Ok(Json(product.into()))
}

/// DELETE /api/products/:id - Delete a product (admin).
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = product_id(&id)?;

    CatalogService::new(state.pool()).delete_product(id).await?;

    Ok(Json(json!({ "message": "Product deleted" })))
}

// =============================================================================
// Reviews
// =============================================================================

/// POST /api/products/:id/reviews - Append a review (authenticated).
///
/// One review per user per product; the product's rating and review count
/// are recomputed with the append.
pub async fn add_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = product_id(&id)?;
    let rating = required(body.rating, "rating")?;

    CatalogService::new(state.pool())
        .add_review(id, &user, rating, &body.comment)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "message": "Review added" }))))
}
