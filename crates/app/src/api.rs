use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use garage_core::{
    paging::parse_flag, CategorySummary, LookupKey, PageRequest, Product, ProductFilter,
    ProductQuery,
};
use garage_storage::CatalogError;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{error, info};

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// Raw `GET /api/products` parameters. Kept as strings so malformed values
/// fall back to defaults instead of rejecting the request.
#[derive(Debug, Default)]
pub struct ProductListParams {
    offset: Option<String>,
    limit: Option<String>,
    in_stock: Option<String>,
    category: Option<String>,
}

impl ProductListParams {
    /// Folds raw query pairs; the first occurrence of a repeated key wins and
    /// unknown keys are ignored.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "offset" => &mut params.offset,
                "limit" => &mut params.limit,
                "in_stock" => &mut params.in_stock,
                "category" => &mut params.category,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }

    fn into_query(self) -> ProductQuery {
        ProductQuery {
            page: PageRequest::parse_lenient(self.offset.as_deref(), self.limit.as_deref()),
            filter: ProductFilter::new(self.in_stock.as_deref().and_then(parse_flag), self.category),
        }
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategorySummary>>, ApiError> {
    let timer = RequestTimer::start("categories.list");
    let result = state.storage().categories().list().await;
    let categories = timer.finish(result)?;

    Ok(Json(categories.iter().map(|c| c.summary()).collect()))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CategorySummary>, ApiError> {
    let timer = RequestTimer::start("categories.get");
    let result = state
        .storage()
        .categories()
        .find(&LookupKey::parse(&key))
        .await;

    match timer.finish(result)? {
        Some(category) => Ok(Json(category.summary())),
        None => Err(ApiError::NotFound {
            resource: "category",
            key,
        }),
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let query = ProductListParams::from_pairs(pairs).into_query();
    let timer = RequestTimer::start("products.list");
    let result = state.storage().products().list(&query).await;
    let products = timer.finish(result)?;

    info!(
        stage = "api",
        offset = query.page.offset(),
        limit = query.page.limit(),
        returned = products.len(),
        "listed products"
    );
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let timer = RequestTimer::start("products.get");
    let result = state
        .storage()
        .products()
        .find(&LookupKey::parse(&key))
        .await;

    match timer.finish(result)? {
        Some(product) => Ok(Json(product)),
        None => Err(ApiError::NotFound {
            resource: "product",
            key,
        }),
    }
}

/// Failures surfaced by catalog endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{resource} '{key}' not found")]
    NotFound { resource: &'static str, key: String },
    #[error("catalog store unavailable: {0}")]
    StoreUnavailable(#[from] CatalogError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound { resource, key } => {
                ProblemResponse::not_found(resource, &key).into_response()
            }
            Self::StoreUnavailable(err) => {
                error!(stage = "api", error = %err, "catalog query failed");
                ProblemResponse::store_unavailable().into_response()
            }
        }
    }
}

/// Records request count and latency for one endpoint.
struct RequestTimer {
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    fn start(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start: Instant::now(),
        }
    }

    fn finish<T>(self, result: Result<T, CatalogError>) -> Result<T, ApiError> {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!("api_requests_total", "endpoint" => self.endpoint, "result" => outcome)
            .increment(1);
        histogram!("api_request_duration_seconds", "endpoint" => self.endpoint)
            .record(self.start.elapsed().as_secs_f64());
        result.map_err(ApiError::from)
    }
}
