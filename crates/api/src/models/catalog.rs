//! Catalog models: categories, products, and embedded reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use clementine_core::{CategoryId, ProductId, ReviewId, UserId};

/// A catalog category. A plain label referenced by products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A product review.
///
/// Stored per product with a one-review-per-user constraint; the reviewer
/// name is a snapshot taken at review time, not a live reference.
#[derive(Debug, Clone)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub reviewer_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A catalog entry.
///
/// `rating` is the arithmetic mean of review ratings and `num_reviews` their
/// count; both are recomputed in the same transaction as every review append.
/// `quantity` (supply count) and `count_in_stock` (sellable count) are
/// independent fields with no enforced relationship.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub image: String,
    pub price: Decimal,
    pub category: Option<Category>,
    pub quantity: i32,
    pub count_in_stock: i32,
    pub rating: Decimal,
    pub num_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
