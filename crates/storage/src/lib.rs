pub mod seed;

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    QueryBuilder, Sqlite, SqlitePool,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use garage_core::{
    Category, CategorySummary, DiscountUnit, LookupKey, Product, ProductQuery,
};

pub use seed::{seed_demo_catalog, NewCategory, NewProduct, SeedOutcome};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// Pragmas are part of the connect options so every pooled connection gets them.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Opens a private in-memory database backed by a single long-lived connection.
    pub async fn connect_in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(StorageError::Connect)?
            .foreign_keys(true);

        // The database lives as long as its only connection does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for reading categories.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for reading products.
    pub fn products(&self) -> ProductRepository {
        ProductRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised by catalog reads.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid value in column {column}: {detail}")]
    Decode { column: &'static str, detail: String },
}

/// Repository for the `category` table.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Lists all categories ordered by creation time, then id.
    pub async fn list(&self) -> Result<Vec<Category>, CatalogError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, created_at FROM category ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CategoryRow::into_domain).collect()
    }

    /// Finds a category by id or slug. Returns `None` when nothing matches.
    pub async fn find(&self, key: &LookupKey) -> Result<Option<Category>, CatalogError> {
        if let LookupKey::Id { id, .. } = key {
            if let Some(category) = self.fetch_one_by("id", &id.to_string()).await? {
                return Ok(Some(category));
            }
        }
        self.fetch_one_by("slug", key.as_str()).await
    }

    async fn fetch_one_by(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<Category>, CatalogError> {
        let sql = format!("SELECT id, name, slug, created_at FROM category WHERE {column} = ?");
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CategoryRow::into_domain).transpose()
    }

    /// Inserts a category; used by seeding and fixtures.
    pub async fn insert(&self, category: &NewCategory) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO category (id, name, slug, created_at) VALUES (?, ?, ?, ?)")
            .bind(category.id.to_string())
            .bind(&category.name)
            .bind(&category.slug)
            .bind(to_rfc3339(category.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
}

impl CategoryRow {
    fn into_domain(self) -> Result<Category, CatalogError> {
        Ok(Category {
            id: parse_uuid("category.id", &self.id)?,
            name: self.name,
            slug: self.slug,
            created_at: self.created_at,
        })
    }
}

const PRODUCT_SELECT: &str = r#"
SELECT p.id,
       p.title,
       p.slug,
       p.description,
       p.year,
       p.image_url,
       p.price,
       p.stock,
       p.discount,
       p.discount_unit,
       c.id AS category_id,
       c.name AS category_name,
       c.slug AS category_slug
  FROM product AS p
  LEFT JOIN category AS c
    ON c.id = p.category_id
"#;

/// Repository for the `product` table joined with its category.
#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Returns one page of products matching every filter in `query`.
    ///
    /// Rows are ordered by `created_at`, then `id`, so consecutive pages never
    /// overlap or skip rows on an unchanged store.
    pub async fn list(&self, query: &ProductQuery) -> Result<Vec<Product>, CatalogError> {
        let mut builder = QueryBuilder::<Sqlite>::new(PRODUCT_SELECT);
        let mut separator = " WHERE ";

        if let Some(in_stock) = query.filter.in_stock {
            builder.push(separator);
            builder.push(if in_stock {
                "p.stock > 0"
            } else {
                "p.stock <= 0"
            });
            separator = " AND ";
        }

        if let Some(slug) = query.filter.category_slug() {
            builder.push(separator);
            builder.push("c.slug = ").push_bind(slug.to_string());
        }

        builder
            .push(" ORDER BY p.created_at ASC, p.id ASC LIMIT ")
            .push_bind(query.page.limit())
            .push(" OFFSET ")
            .push_bind(query.page.offset());

        debug!(
            stage = "storage",
            offset = query.page.offset(),
            limit = query.page.limit(),
            in_stock = ?query.filter.in_stock,
            category = ?query.filter.category_slug(),
            "listing products"
        );

        let rows = builder
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ProductRow::into_domain).collect()
    }

    /// Finds a product by id or slug. Returns `None` when nothing matches.
    pub async fn find(&self, key: &LookupKey) -> Result<Option<Product>, CatalogError> {
        if let LookupKey::Id { id, .. } = key {
            if let Some(product) = self.fetch_one_by("p.id", &id.to_string()).await? {
                return Ok(Some(product));
            }
        }
        self.fetch_one_by("p.slug", key.as_str()).await
    }

    async fn fetch_one_by(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<Product>, CatalogError> {
        let sql = format!("{PRODUCT_SELECT} WHERE {column} = ?");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProductRow::into_domain).transpose()
    }

    /// Inserts a product; used by seeding and fixtures.
    pub async fn insert(&self, product: &NewProduct) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO product \
             (id, title, slug, description, category_id, year, image_url, price, stock, discount, discount_unit, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product.id.to_string())
        .bind(&product.title)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.category_id.map(|id| id.to_string()))
        .bind(product.year)
        .bind(&product.image_url)
        .bind(product.price.to_string())
        .bind(product.stock)
        .bind(product.discount.to_string())
        .bind(product.discount_unit.as_str())
        .bind(to_rfc3339(product.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Product row joined with the optional category columns.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    title: String,
    slug: String,
    description: String,
    year: i32,
    image_url: Option<String>,
    price: String,
    stock: i64,
    discount: String,
    discount_unit: String,
    category_id: Option<String>,
    category_name: Option<String>,
    category_slug: Option<String>,
}

impl ProductRow {
    fn into_domain(self) -> Result<Product, CatalogError> {
        let category = match (self.category_id, self.category_name, self.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(CategorySummary {
                id: parse_uuid("category.id", &id)?,
                name,
                slug,
            }),
            _ => None,
        };

        let discount_unit =
            DiscountUnit::from_str(&self.discount_unit).map_err(|err| CatalogError::Decode {
                column: "product.discount_unit",
                detail: err.to_string(),
            })?;

        Ok(Product {
            id: parse_uuid("product.id", &self.id)?,
            title: self.title,
            slug: self.slug,
            description: self.description,
            year: self.year,
            image_url: self.image_url.filter(|url| !url.is_empty()),
            price: parse_decimal("product.price", &self.price)?,
            stock: self.stock,
            discount: parse_decimal("product.discount", &self.discount)?,
            discount_unit,
            category,
        })
    }
}

fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid, CatalogError> {
    Uuid::parse_str(value).map_err(|err| CatalogError::Decode {
        column,
        detail: err.to_string(),
    })
}

fn parse_decimal(column: &'static str, value: &str) -> Result<Decimal, CatalogError> {
    Decimal::from_str(value.trim()).map_err(|err| CatalogError::Decode {
        column,
        detail: err.to_string(),
    })
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
