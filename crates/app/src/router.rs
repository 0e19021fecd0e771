use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use garage_storage::Database;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::{api, openapi, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    allowed_origins: Vec<String>,
    serve_openapi: bool,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database) -> Self {
        Self {
            metrics,
            storage,
            allowed_origins: Vec::new(),
            serve_openapi: false,
        }
    }

    /// Origins allowed to call the API from a browser.
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Exposes the OpenAPI document; only enabled in development.
    pub fn with_openapi(mut self, enabled: bool) -> Self {
        self.serve_openapi = enabled;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/categories", get(api::list_categories))
        .route("/api/categories/:key", get(api::get_category))
        .route("/api/products", get(api::list_products))
        .route("/api/products/:key", get(api::get_product));
    if state.serve_openapi {
        router = router.route(openapi::OPENAPI_PATH, get(openapi::openapi_document));
    }

    router.layer(cors).with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(stage = "app", %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(AllowOrigin::list(allowed))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::{Duration, TimeZone, Utc};
    use garage_core::DiscountUnit;
    use garage_storage::{NewCategory, NewProduct};
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    const CARS: Uuid = Uuid::from_u128(0xa);
    const PARTS: Uuid = Uuid::from_u128(0xb);
    const P1: Uuid = Uuid::from_u128(0x1);
    const P2: Uuid = Uuid::from_u128(0x2);
    const P3: Uuid = Uuid::from_u128(0x3);

    fn new_product(id: Uuid, slug: &str, stock: i64, category_id: Option<Uuid>, minute: i64) -> NewProduct {
        NewProduct {
            id,
            title: slug.to_uppercase(),
            slug: slug.to_string(),
            description: format!("{slug} description"),
            category_id,
            year: 2022,
            image_url: Some(format!("https://img.test/{slug}.png")),
            price: Decimal::new(1_500_000, 0),
            stock,
            discount: Decimal::new(10, 0),
            discount_unit: DiscountUnit::Percent,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    async fn setup_state() -> AppState {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let database = Database::connect_in_memory().await.expect("connect");
        database.run_migrations().await.expect("migrations");

        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (id, name, slug) in [(CARS, "Cars", "cars"), (PARTS, "Parts", "parts")] {
            database
                .categories()
                .insert(&NewCategory {
                    id,
                    name: name.to_string(),
                    slug: slug.to_string(),
                    created_at,
                })
                .await
                .expect("insert category");
        }
        for record in [
            new_product(P1, "p1", 5, Some(CARS), 1),
            new_product(P2, "p2", 0, Some(PARTS), 2),
            new_product(P3, "p3", 3, None, 3),
        ] {
            database
                .products()
                .insert(&record)
                .await
                .expect("insert product");
        }

        AppState::new(metrics, database)
            .with_allowed_origins(vec!["http://localhost:5173".to_string()])
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = app_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .expect("handler should respond");
        let status = response.status();
        let collected = response.into_body().collect().await.expect("body");
        let body = serde_json::from_slice(&collected.to_bytes()).unwrap_or(Value::Null);
        (status, body)
    }

    fn slugs(body: &Value) -> Vec<String> {
        body.as_array()
            .expect("array body")
            .iter()
            .map(|item| item["slug"].as_str().expect("slug").to_string())
            .collect()
    }

    fn products_uri(params: &[(&str, &str)]) -> String {
        let query = serde_urlencoded::to_string(params).expect("encode");
        if query.is_empty() {
            "/api/products".to_string()
        } else {
            format!("/api/products?{query}")
        }
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = app_router(setup_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let state = setup_state().await;
        let _ = get(state.clone(), "/api/products").await;

        let response = app_router(state)
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }

    #[tokio::test]
    async fn lists_products_with_category_or_null() {
        let (status, body) = get(setup_state().await, "/api/products").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(slugs(&body), vec!["p1", "p2", "p3"]);

        let first = &body[0];
        assert_eq!(first["imageUrl"], "https://img.test/p1.png");
        assert_eq!(first["discountUnit"], "percent");
        assert_eq!(first["price"].as_f64(), Some(1_500_000.0));
        assert_eq!(first["category"]["slug"], "cars");
        assert!(body[2]["category"].is_null());
    }

    #[tokio::test]
    async fn filters_follow_scenario() {
        let state = setup_state().await;

        let (_, body) = get(state.clone(), &products_uri(&[("in_stock", "true")])).await;
        assert_eq!(slugs(&body), vec!["p1", "p3"]);

        let (_, body) = get(state.clone(), &products_uri(&[("in_stock", "false")])).await;
        assert_eq!(slugs(&body), vec!["p2"]);

        let (_, body) = get(state.clone(), &products_uri(&[("category", "parts")])).await;
        assert_eq!(slugs(&body), vec!["p2"]);

        let (status, body) = get(
            state,
            &products_uri(&[("category", "parts"), ("in_stock", "true")]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(slugs(&body).is_empty());
    }

    #[tokio::test]
    async fn pagination_values_are_clamped_not_rejected() {
        let state = setup_state().await;

        let (status, body) = get(state.clone(), &products_uri(&[("limit", "0")])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(slugs(&body), vec!["p1"]);

        let (_, body) = get(state.clone(), &products_uri(&[("offset", "-5"), ("limit", "2")])).await;
        assert_eq!(slugs(&body), vec!["p1", "p2"]);

        let (_, body) = get(state.clone(), &products_uri(&[("offset", "2"), ("limit", "500")])).await;
        assert_eq!(slugs(&body), vec!["p3"]);

        let (status, body) = get(
            state,
            &products_uri(&[("offset", "abc"), ("limit", "x"), ("in_stock", "maybe")]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(slugs(&body), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn repeated_query_keys_use_the_first_value() {
        let state = setup_state().await;

        let (status, body) = get(state.clone(), "/api/products?limit=1&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(slugs(&body), vec!["p1"]);

        let (status, body) = get(state, "/api/products?limit=5&in_stock=true&in_stock=false").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(slugs(&body), vec!["p1", "p3"]);
    }

    #[tokio::test]
    async fn uuid_shaped_slug_resolves_to_its_product() {
        let state = setup_state().await;
        let slug = "cafebabecafebabecafebabecafebabe";
        state
            .storage()
            .products()
            .insert(&new_product(Uuid::from_u128(0x50), slug, 1, None, 9))
            .await
            .expect("insert product");

        let (status, body) = get(state, &format!("/api/products/{slug}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slug"], slug);
    }

    #[tokio::test]
    async fn openapi_document_is_served_only_when_enabled() {
        let state = setup_state().await;

        let (status, body) = get(state.clone().with_openapi(true), openapi::OPENAPI_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/products"]["get"].is_object());

        let (status, _) = get(state, openapi::OPENAPI_PATH).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_category_is_ignored() {
        let (_, body) = get(setup_state().await, &products_uri(&[("category", "  ")])).await;
        assert_eq!(slugs(&body).len(), 3);
    }

    #[tokio::test]
    async fn product_lookup_by_slug_and_id() {
        let state = setup_state().await;

        let (status, body) = get(state.clone(), "/api/products/p2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], P2.to_string());
        assert_eq!(body["category"]["name"], "Parts");

        let (status, body) = get(state, &format!("/api/products/{P3}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slug"], "p3");
        assert!(body["category"].is_null());
    }

    #[tokio::test]
    async fn unknown_resources_return_problem_404() {
        let state = setup_state().await;

        let response = app_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/products/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let (status, body) = get(state.clone(), "/api/categories/boats").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "not_found");

        let (status, _) = get(state, &format!("/api/categories/{}", Uuid::from_u128(0xdead))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn categories_list_and_lookup() {
        let state = setup_state().await;

        let (status, body) = get(state.clone(), "/api/categories").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(slugs(&body), vec!["cars", "parts"]);
        assert!(body[0].get("created_at").is_none());

        let (status, body) = get(state, "/api/categories/parts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], PARTS.to_string());
        assert_eq!(body["name"], "Parts");
    }

    #[tokio::test]
    async fn store_failure_returns_generic_500() {
        let state = setup_state().await;
        state.storage().pool().close().await;

        let (status, body) = get(state, "/api/products").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["type"], "store_unavailable");
        assert!(!body["detail"].as_str().unwrap_or_default().contains("pool"));
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let state = setup_state().await;

        let response = app_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/categories")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "http://localhost:5173"
        );

        let response = app_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/categories")
                    .header(header::ORIGIN, "https://evil.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
