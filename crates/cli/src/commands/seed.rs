//! Seed the database with demo catalog data.
//!
//! Inserts a handful of categories and products so a fresh deployment has
//! something to browse. Safe to re-run: existing categories are reused by
//! name, and duplicate inserts are skipped.

use rust_decimal::Decimal;

use clementine_api::db::products::NewProduct;
use clementine_api::db::{CategoryRepository, ProductRepository};
use clementine_api::models::Category;

const CATEGORIES: &[&str] = &["Electronics", "Books", "Clothing"];

struct DemoProduct {
    name: &'static str,
    description: &'static str,
    brand: &'static str,
    category: &'static str,
    price_cents: i64,
    quantity: i32,
    count_in_stock: i32,
}

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        name: "Wireless Headphones",
        description: "Over-ear wireless headphones with 30 hour battery life",
        brand: "Acme Audio",
        category: "Electronics",
        price_cents: 89_99,
        quantity: 25,
        count_in_stock: 25,
    },
    DemoProduct {
        name: "Mechanical Keyboard",
        description: "Tenkeyless mechanical keyboard with hot-swappable switches",
        brand: "Keysmith",
        category: "Electronics",
        price_cents: 129_00,
        quantity: 10,
        count_in_stock: 8,
    },
    DemoProduct {
        name: "The Pragmatic Shopkeeper",
        description: "Essays on running a small store well",
        brand: "Inkwell Press",
        category: "Books",
        price_cents: 24_50,
        quantity: 40,
        count_in_stock: 40,
    },
    DemoProduct {
        name: "Linen Shirt",
        description: "Relaxed-fit linen shirt, garment dyed",
        brand: "Harbor & Co",
        category: "Clothing",
        price_cents: 59_00,
        quantity: 15,
        count_in_stock: 12,
    },
];

/// Seed demo categories and products.
///
/// # Errors
///
/// Returns an error if a database operation fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let categories = CategoryRepository::new(&pool);
    let products = ProductRepository::new(&pool);

    let mut created: Vec<Category> = Vec::new();
    let existing = categories.list_all().await?;

    for name in CATEGORIES {
        match existing.iter().find(|c| c.name == *name) {
            Some(category) => created.push(category.clone()),
            None => {
                let category = categories.create(name).await?;
                tracing::info!(category = %category.name, "category created");
                created.push(category);
            }
        }
    }

    let catalog = products.list_all().await?;
    for demo in PRODUCTS {
        if catalog.iter().any(|p| p.name == demo.name) {
            tracing::info!(product = demo.name, "already seeded, skipping");
            continue;
        }

        let category = created
            .iter()
            .find(|c| c.name == demo.category)
            .ok_or("seed category missing")?;

        let product = products
            .insert(&NewProduct {
                name: demo.name.to_owned(),
                description: demo.description.to_owned(),
                brand: demo.brand.to_owned(),
                image: "/uploads/placeholder.png".to_owned(),
                price: Decimal::new(demo.price_cents, 2),
                category_id: category.id,
                quantity: demo.quantity,
                count_in_stock: demo.count_in_stock,
            })
            .await?;

        tracing::info!(product_id = %product.id, name = %product.name, "product seeded");
    }

    tracing::info!("Seed complete!");
    Ok(())
}
