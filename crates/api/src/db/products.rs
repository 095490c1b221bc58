//! Product repository for database operations.
//!
//! Products carry denormalized review aggregates (`rating`, `num_reviews`).
//! Review appends recompute both inside the same transaction as the insert,
//! so concurrent reviewers cannot observe or produce stale aggregates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use clementine_core::{CategoryId, ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::{Category, Product, Review};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for product queries (category pre-joined).
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    brand: String,
    image: String,
    price: Decimal,
    category_id: Option<i32>,
    category_name: Option<String>,
    quantity: i32,
    count_in_stock: i32,
    rating: Decimal,
    num_reviews: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let category = match (row.category_id, row.category_name) {
            (Some(id), Some(name)) => Some(Category {
                id: CategoryId::new(id),
                name,
            }),
            // Dangling reference after a category delete
            _ => None,
        };

        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            brand: row.brand,
            image: row.image,
            price: row.price,
            category,
            quantity: row.quantity,
            count_in_stock: row.count_in_stock,
            rating: row.rating,
            num_reviews: row.num_reviews,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for review queries.
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    product_id: i32,
    user_id: i32,
    reviewer_name: String,
    rating: i32,
    comment: String,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            product_id: ProductId::new(row.product_id),
            user_id: UserId::new(row.user_id),
            reviewer_name: row.reviewer_name,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.description, p.brand, p.image, p.price, \
       p.category_id, c.name AS category_name, \
       p.quantity, p.count_in_stock, p.rating, p.num_reviews, \
       p.created_at, p.updated_at \
     FROM products p LEFT JOIN categories c ON c.id = p.category_id";

// =============================================================================
// Write Payloads
// =============================================================================

/// Fields for a new product.
#[derive(Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub brand: String,
    pub image: String,
    pub price: Decimal,
    pub category_id: CategoryId,
    pub quantity: i32,
    pub count_in_stock: i32,
}

/// Field changes for a product update. `None` retains the stored value.
#[derive(Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub image: Option<String>,
    pub price: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub quantity: Option<i32>,
    pub count_in_stock: Option<i32>,
}

/// Escape LIKE/ILIKE metacharacters in user-supplied search input.
///
/// The pattern is applied with `ESCAPE '\'`, so backslash itself must be
/// doubled before `%` and `_` are neutralized.
#[must_use]
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product and review database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Count products whose name matches the keyword (all products if none).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, keyword: Option<&str>) -> Result<i64, RepositoryError> {
        let pattern = keyword.map(escape_like);
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM products p \
             WHERE ($1::text IS NULL OR p.name ILIKE ('%' || $1 || '%') ESCAPE '\\')",
        )
        .bind(pattern)
        .fetch_one(self.pool)
        .await?;

        Ok(count.0)
    }

    /// Fetch one page of products in insertion order.
    ///
    /// `page` is 1-based; the keyword is a case-insensitive substring match
    /// against the product name only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn page(
        &self,
        keyword: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let pattern = keyword.map(escape_like);
        let offset = page_size * (page - 1);

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} \
             WHERE ($1::text IS NULL OR p.name ILIKE ('%' || $1 || '%') ESCAPE '\\') \
             ORDER BY p.id \
             LIMIT $2 OFFSET $3"
        ))
        .bind(pattern)
        .bind(page_size)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product by ID, category expanded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    /// The entire catalog, newest first. Unpaginated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("{PRODUCT_SELECT} ORDER BY p.created_at DESC"))
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The highest-rated products, rating descending, id as tie-break.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} ORDER BY p.rating DESC, p.id LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The most recently created products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn newest(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} ORDER BY p.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Compound filter: category membership and inclusive price range.
    ///
    /// Either condition may be absent; with neither this is the unfiltered
    /// catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn filter(
        &self,
        category_ids: Option<&[CategoryId]>,
        price_range: Option<(Decimal, Decimal)>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let ids: Option<Vec<i32>> =
            category_ids.map(|ids| ids.iter().map(|id| id.as_i32()).collect());
        let (min_price, max_price) = match price_range {
            Some((min, max)) => (Some(min), Some(max)),
            None => (None, None),
        };

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} \
             WHERE ($1::int4[] IS NULL OR p.category_id = ANY($1)) \
               AND ($2::numeric IS NULL OR (p.price >= $2 AND p.price <= $3)) \
             ORDER BY p.id"
        ))
        .bind(ids)
        .bind(min_price)
        .bind(max_price)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO products \
                (name, description, brand, image, price, category_id, quantity, count_in_stock) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.brand)
        .bind(&new.image)
        .bind(new.price)
        .bind(new.category_id.as_i32())
        .bind(new.quantity)
        .bind(new.count_in_stock)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write_error(e, "product already exists"))?;

        self.get_by_id(ProductId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Apply field changes to a product. Fields left `None` keep their value.
    ///
    /// Returns `None` if the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if a new category does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Option<Product>, RepositoryError> {
        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE products SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                brand = COALESCE($4, brand), \
                image = COALESCE($5, image), \
                price = COALESCE($6, price), \
                category_id = COALESCE($7, category_id), \
                quantity = COALESCE($8, quantity), \
                count_in_stock = COALESCE($9, count_in_stock), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id.as_i32())
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.brand.as_deref())
        .bind(changes.image.as_deref())
        .bind(changes.price)
        .bind(changes.category_id.map(|c| c.as_i32()))
        .bind(changes.quantity)
        .bind(changes.count_in_stock)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write_error(e, "product already exists"))?;

        match updated {
            Some(_) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Delete a product by ID.
    ///
    /// # Returns
    ///
    /// Returns `true` if the product was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List the reviews of a product, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reviews_for(&self, id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT id, product_id, user_id, reviewer_name, rating, comment, created_at \
             FROM reviews WHERE product_id = $1 ORDER BY created_at, id",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Append a review and recompute the product's aggregates.
    ///
    /// The insert and the aggregate update run in one transaction, so
    /// `rating` stays the mean of the stored review ratings and
    /// `num_reviews` their exact count even under concurrent appends.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if this user already reviewed the
    /// product.
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn add_review(
        &self,
        product_id: ProductId,
        user_id: UserId,
        reviewer_name: &str,
        rating: i32,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: ReviewRow = sqlx::query_as(
            "INSERT INTO reviews (product_id, user_id, reviewer_name, rating, comment) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, product_id, user_id, reviewer_name, rating, comment, created_at",
        )
        .bind(product_id.as_i32())
        .bind(user_id.as_i32())
        .bind(reviewer_name)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write_error(e, "product already reviewed"))?;

        sqlx::query(
            "UPDATE products SET \
                rating = (SELECT COALESCE(AVG(rating), 0) FROM reviews WHERE product_id = $1), \
                num_reviews = (SELECT COUNT(*) FROM reviews WHERE product_id = $1), \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(product_id.as_i32())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_metacharacters() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("%_\\"), "\\%\\_\\\\");
    }
}
