//! Catalog service: products, categories, and reviews.
//!
//! Owns the validation rules on top of the product and category
//! repositories. Pagination math lives here so the handlers and tests share
//! one definition.

use rust_decimal::Decimal;
use sqlx::PgPool;

use clementine_core::{CategoryId, Patch, ProductId};

use crate::db::products::{NewProduct, ProductChanges};
use crate::db::{CategoryRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::{Category, Product, Review, User};

/// Fixed page size of the product listing.
pub const PAGE_SIZE: i64 = 6;

/// Number of products on the top-rated shelf.
pub const TOP_LIMIT: i64 = 4;

/// Number of products on the new-arrivals shelf.
pub const NEW_LIMIT: i64 = 5;

/// Total page count for a result set.
#[must_use]
pub const fn page_count(total: i64, page_size: i64) -> i64 {
    (total + page_size - 1) / page_size
}

/// Whether a further page exists after `page`.
#[must_use]
pub const fn has_more(page: i64, page_size: i64, total: i64) -> bool {
    page * page_size < total
}

/// One page of catalog results.
#[derive(Debug)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: i64,
    pub pages: i64,
    pub has_more: bool,
}

/// Validated input for creating a product.
///
/// All fields are required; `count_in_stock` defaults to 0 when absent.
#[derive(Debug)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub brand: String,
    pub image: String,
    pub price: Decimal,
    pub category: CategoryId,
    pub quantity: i32,
    pub count_in_stock: Option<i32>,
}

/// Tri-state changes for a product update.
///
/// Every product field is required, so an explicit `null` is rejected rather
/// than treated as "keep"; the two cases are not conflated.
#[derive(Debug, Default)]
pub struct UpdateProduct {
    pub name: Patch<String>,
    pub description: Patch<String>,
    pub brand: Patch<String>,
    pub image: Patch<String>,
    pub price: Patch<Decimal>,
    pub category: Patch<CategoryId>,
    pub quantity: Patch<i32>,
    pub count_in_stock: Patch<i32>,
}

/// Catalog service.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    categories: CategoryRepository<'a>,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool),
            categories: CategoryRepository::new(pool),
        }
    }

    // =========================================================================
    // Product Queries
    // =========================================================================

    /// One page of products, optionally keyword-filtered by name substring.
    ///
    /// # Errors
    ///
    /// Returns a database error if a query fails.
    pub async fn product_page(&self, page: i64, keyword: Option<&str>) -> Result<ProductPage> {
        let page = page.max(1);
        let keyword = keyword.filter(|k| !k.trim().is_empty());

        let total = self.products.count(keyword).await?;
        let products = self.products.page(keyword, page, PAGE_SIZE).await?;

        Ok(ProductPage {
            products,
            page,
            pages: page_count(total, PAGE_SIZE),
            has_more: has_more(page, PAGE_SIZE, total),
        })
    }

    /// Get a product with its reviews.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist.
    pub async fn get_product(&self, id: ProductId) -> Result<(Product, Vec<Review>)> {
        let product = self
            .products
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
        let reviews = self.products.reviews_for(id).await?;

        Ok((product, reviews))
    }

    /// The entire catalog, newest first.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn all_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.list_all().await?)
    }

    /// The highest-rated products.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn top_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.top(TOP_LIMIT).await?)
    }

    /// The most recently created products.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn new_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.newest(NEW_LIMIT).await?)
    }

    /// Compound category/price filter.
    ///
    /// The price range applies only when exactly two bounds are given; an
    /// empty category list means no category condition.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn filter_products(
        &self,
        checked: &[CategoryId],
        radio: &[Decimal],
    ) -> Result<Vec<Product>> {
        let categories = (!checked.is_empty()).then_some(checked);
        let price_range = match radio {
            [min, max] => Some((*min, *max)),
            _ => None,
        };

        Ok(self.products.filter(categories, price_range).await?)
    }

    // =========================================================================
    // Product Mutations
    // =========================================================================

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` on empty fields or a negative price.
    /// Returns `AppError::NotFound` if the category doesn't exist.
    pub async fn create_product(&self, input: CreateProduct) -> Result<Product> {
        let name = non_empty(&input.name, "name")?;
        let description = non_empty(&input.description, "description")?;
        let brand = non_empty(&input.brand, "brand")?;
        let image = non_empty(&input.image, "image")?;
        validate_price(input.price)?;

        let new = NewProduct {
            name,
            description,
            brand,
            image,
            price: input.price,
            category_id: input.category,
            quantity: input.quantity,
            count_in_stock: input.count_in_stock.unwrap_or(0),
        };

        self.products.insert(&new).await.map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Category not found".to_owned()),
            other => other.into(),
        })
    }

    /// Apply a partial update to a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if a field is explicitly null or a new
    /// price is negative.
    /// Returns `AppError::NotFound` if the product doesn't exist.
    pub async fn update_product(&self, id: ProductId, update: UpdateProduct) -> Result<Product> {
        let changes = ProductChanges {
            name: required_patch(update.name, "name")?.map(|s| s.trim().to_owned()),
            description: required_patch(update.description, "description")?
                .map(|s| s.trim().to_owned()),
            brand: required_patch(update.brand, "brand")?.map(|s| s.trim().to_owned()),
            image: required_patch(update.image, "image")?,
            price: required_patch(update.price, "price")?,
            category_id: required_patch(update.category, "category")?,
            quantity: required_patch(update.quantity, "quantity")?,
            count_in_stock: required_patch(update.count_in_stock, "countInStock")?,
        };

        if let Some(price) = changes.price {
            validate_price(price)?;
        }

        self.products
            .update(id, &changes)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AppError::NotFound("Category not found".to_owned()),
                other => other.into(),
            })?
            .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist.
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        if !self.products.delete(id).await? {
            return Err(AppError::NotFound("Product not found".to_owned()));
        }
        Ok(())
    }

    /// Append a review by `user`, recomputing the product's aggregates.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` on an out-of-range rating.
    /// Returns `AppError::Conflict` if the user already reviewed the product.
    /// Returns `AppError::NotFound` if the product doesn't exist.
    pub async fn add_review(
        &self,
        product_id: ProductId,
        user: &User,
        rating: i32,
        comment: &str,
    ) -> Result<Review> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(
                "Rating must be between 1 and 5".to_owned(),
            ));
        }

        self.products
            .add_review(product_id, user.id, &user.username, rating, comment)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    AppError::Conflict("Product already reviewed".to_owned())
                }
                RepositoryError::NotFound => AppError::NotFound("Product not found".to_owned()),
                other => other.into(),
            })
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.list_all().await?)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` on an empty name.
    /// Returns `AppError::Conflict` if the name is taken.
    pub async fn create_category(&self, name: &str) -> Result<Category> {
        let name = non_empty(name, "name")?;
        Ok(self.categories.create(&name).await?)
    }

    /// Rename a category.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` on an empty name.
    /// Returns `AppError::Conflict` if the name is taken.
    /// Returns `AppError::NotFound` if the category doesn't exist.
    pub async fn rename_category(&self, id: CategoryId, name: &str) -> Result<Category> {
        let name = non_empty(name, "name")?;
        self.categories
            .rename(id, &name)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_owned()))
    }

    /// Delete a category. Does not cascade into products.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the category doesn't exist.
    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        if !self.categories.delete(id).await? {
            return Err(AppError::NotFound("Category not found".to_owned()));
        }
        Ok(())
    }
}

/// Reject an empty or whitespace-only required field.
fn non_empty(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!(
            "Please fill all required fields: '{field}' is missing"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Reject a negative price.
fn validate_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(AppError::Validation("Price cannot be negative".to_owned()));
    }
    Ok(())
}

/// Resolve a tri-state field whose column is NOT NULL: a value passes
/// through, absence keeps the stored value, and an explicit null is rejected.
fn required_patch<T>(patch: Patch<T>, field: &str) -> Result<Option<T>> {
    if patch.is_null() {
        return Err(AppError::Validation(format!(
            "Field '{field}' cannot be null"
        )));
    }
    Ok(patch.into_value())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, PAGE_SIZE), 0);
        assert_eq!(page_count(1, PAGE_SIZE), 1);
        assert_eq!(page_count(6, PAGE_SIZE), 1);
        assert_eq!(page_count(7, PAGE_SIZE), 2);
        assert_eq!(page_count(12, PAGE_SIZE), 2);
        assert_eq!(page_count(13, PAGE_SIZE), 3);
    }

    #[test]
    fn has_more_matches_page_arithmetic() {
        // 13 products, page size 6: pages 1 and 2 have more, page 3 is last
        assert!(has_more(1, PAGE_SIZE, 13));
        assert!(has_more(2, PAGE_SIZE, 13));
        assert!(!has_more(3, PAGE_SIZE, 13));

        // exact multiple: the final full page reports no more
        assert!(has_more(1, PAGE_SIZE, 12));
        assert!(!has_more(2, PAGE_SIZE, 12));
    }

    #[test]
    fn non_empty_trims_and_rejects_blank() {
        assert_eq!(non_empty("  Widget  ", "name").unwrap(), "Widget");
        assert!(non_empty("   ", "name").is_err());
        assert!(non_empty("", "name").is_err());
    }

    #[test]
    fn negative_price_rejected() {
        assert!(validate_price(Decimal::new(-1, 2)).is_err());
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::new(999, 2)).is_ok());
    }

    #[test]
    fn required_patch_semantics() {
        assert_eq!(required_patch(Patch::Value(5), "quantity").unwrap(), Some(5));
        assert_eq!(required_patch(Patch::<i32>::Missing, "quantity").unwrap(), None);
        assert!(required_patch(Patch::<i32>::Null, "quantity").is_err());
    }
}
