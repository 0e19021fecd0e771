//! Demo catalog used by development databases.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use garage_core::DiscountUnit;

use crate::{Database, StorageError};

/// Category to insert.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Product to insert.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub year: i32,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub discount: Decimal,
    pub discount_unit: DiscountUnit,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded { categories: usize, products: usize },
    AlreadyPopulated,
}

const CARS: Uuid = Uuid::from_u128(0x0c4a_5000_0000_4000_8000_0000_0000_0001);
const PARTS: Uuid = Uuid::from_u128(0x0c4a_5000_0000_4000_8000_0000_0000_0002);
const ACCESSORIES: Uuid = Uuid::from_u128(0x0c4a_5000_0000_4000_8000_0000_0000_0003);

/// Inserts the demo catalog unless the store already holds categories.
pub async fn seed_demo_catalog(database: &Database) -> Result<SeedOutcome, StorageError> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM category")
        .fetch_one(database.pool())
        .await?;
    if existing > 0 {
        info!(stage = "storage", existing, "catalog already populated; skipping seed");
        return Ok(SeedOutcome::AlreadyPopulated);
    }

    let categories = demo_categories();
    let products = demo_products();

    let category_repo = database.categories();
    for category in &categories {
        category_repo.insert(category).await?;
    }
    let product_repo = database.products();
    for product in &products {
        product_repo.insert(product).await?;
    }

    info!(
        stage = "storage",
        categories = categories.len(),
        products = products.len(),
        "seeded demo catalog"
    );
    Ok(SeedOutcome::Seeded {
        categories: categories.len(),
        products: products.len(),
    })
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn demo_categories() -> Vec<NewCategory> {
    let base = base_time();
    [
        (CARS, "Cars", "cars"),
        (PARTS, "Parts", "parts"),
        (ACCESSORIES, "Accessories", "accessories"),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (id, name, slug))| NewCategory {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        created_at: base + Duration::minutes(index as i64),
    })
    .collect()
}

fn demo_products() -> Vec<NewProduct> {
    let base = base_time() + Duration::hours(1);
    let rows: [(&str, &str, Option<Uuid>, i32, i64, i64, i64, DiscountUnit); 8] = [
        ("Toyota Corolla GR", "toyota-corolla-gr", Some(CARS), 2023, 650_000_000, 2, 0, DiscountUnit::Percent),
        ("Honda Civic Type R", "honda-civic-type-r", Some(CARS), 2022, 1_400_000_000, 0, 5, DiscountUnit::Percent),
        ("Suzuki Jimny", "suzuki-jimny", Some(CARS), 2021, 480_000_000, 1, 0, DiscountUnit::Percent),
        ("Ceramic Brake Pads", "ceramic-brake-pads", Some(PARTS), 2024, 850_000, 40, 10, DiscountUnit::Fraction),
        ("Oil Filter", "oil-filter", Some(PARTS), 2024, 95_000, 0, 0, DiscountUnit::Percent),
        ("Coilover Kit", "coilover-kit", Some(PARTS), 2023, 12_500_000, 3, 15, DiscountUnit::Percent),
        ("Leather Steering Cover", "leather-steering-cover", Some(ACCESSORIES), 2024, 175_000, 25, 20, DiscountUnit::Fraction),
        ("Garage Gift Card", "garage-gift-card", None, 2024, 500_000, 100, 0, DiscountUnit::Percent),
    ];

    rows.into_iter()
        .enumerate()
        .map(
            |(index, (title, slug, category_id, year, price, stock, discount, unit))| {
                // Fraction discounts are stored as hundredths (10 -> 0.10).
                let discount = match unit {
                    DiscountUnit::Percent => Decimal::new(discount, 0),
                    DiscountUnit::Fraction => Decimal::new(discount, 2),
                };
                NewProduct {
                    id: Uuid::from_u128(0x0c4a_5000_0000_4000_8000_0001_0000_0000 + index as u128),
                    title: title.to_string(),
                    slug: slug.to_string(),
                    description: format!("{title} ({year})"),
                    category_id,
                    year,
                    image_url: Some(format!("https://images.garage.test/{slug}.jpg")),
                    price: Decimal::new(price, 0),
                    stock,
                    discount,
                    discount_unit: unit,
                    created_at: base + Duration::minutes(index as i64),
                }
            },
        )
        .collect()
}
