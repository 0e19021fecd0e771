//! Paginated product list driven by a navigable query string.

use std::sync::{Arc, Mutex, PoisonError};

use garage_core::{
    paging::parse_flag,
    pricing::{format_idr, PriceTag},
    PageRequest, Product, ProductFilter,
};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::api::{CatalogClient, ListProductsParams};
use crate::cancel::CancellationToken;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load products. Please try again.";
pub const EMPTY_MESSAGE: &str = "No products found.";
pub const LOADING_MESSAGE: &str = "Loading products...";
pub const UNCATEGORIZED: &str = "Uncategorized";

/// List state reconstructed from the query string (`?page=2&in_stock=true&category=parts`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub filter: ProductFilter,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            filter: ProductFilter::default(),
        }
    }
}

impl ListQuery {
    /// Parses a query string with or without the leading `?`. Invalid pages become 1.
    pub fn from_query_string(raw: &str) -> Self {
        let mut page = 1;
        let mut in_stock = None;
        let mut category = None;

        let raw = raw.strip_prefix('?').unwrap_or(raw);
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "page" => {
                    page = value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|page| *page > 0)
                        .unwrap_or(1)
                }
                "in_stock" => in_stock = parse_flag(&value),
                "category" => category = Some(value.into_owned()),
                _ => {}
            }
        }

        Self {
            page,
            filter: ProductFilter::new(in_stock, category),
        }
    }

    /// Serializes the state back into a shareable query string (without `?`).
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("page", &self.page.to_string());
        if let Some(in_stock) = self.filter.in_stock {
            serializer.append_pair("in_stock", if in_stock { "true" } else { "false" });
        }
        if let Some(category) = self.filter.category_slug() {
            serializer.append_pair("category", category);
        }
        serializer.finish()
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            filter: self.filter.clone(),
        }
    }

    /// Request parameters for this page.
    pub fn params(&self, page_size: i64) -> ListProductsParams {
        let window = PageRequest::for_page(self.page, page_size);
        ListProductsParams {
            offset: Some(window.offset()),
            limit: Some(window.limit()),
            in_stock: self.filter.in_stock,
            category: self.filter.category_slug().map(str::to_string),
        }
    }
}

/// Display fields of one product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCard {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price_label: String,
    pub final_price_label: String,
    pub discount_percent: Decimal,
    /// Whether the strike-through original price is shown.
    pub has_discount: bool,
    pub stock: i64,
    pub available: bool,
    pub category_label: String,
}

impl ProductCard {
    pub fn from_product(product: &Product) -> Self {
        let tag = PriceTag::for_product(product);
        Self {
            slug: product.slug.clone(),
            title: product.title.clone(),
            description: product.description.clone(),
            price_label: format_idr(tag.original),
            final_price_label: format_idr(tag.final_price),
            discount_percent: tag.discount_percent,
            has_discount: tag.has_discount(),
            stock: product.stock,
            available: product.is_available(),
            category_label: product
                .category
                .as_ref()
                .map(|category| category.name.clone())
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        }
    }
}

/// A loaded, non-empty page with its navigation links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    pub query: ListQuery,
    pub cards: Vec<ProductCard>,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_link: Option<String>,
    pub previous_link: Option<String>,
}

impl ProductPage {
    /// A full page implies there may be more; anything shorter is the last page.
    pub fn build(query: ListQuery, products: &[Product], page_size: i64) -> Self {
        let next_page = query
            .page
            .checked_add(1)
            .filter(|_| products.len() as i64 >= page_size);
        let previous_page = query.page.checked_sub(1).filter(|page| *page > 0);
        let link = |page: u32| format!("?{}", query.with_page(page).to_query_string());
        let has_next = next_page.is_some();
        let has_previous = previous_page.is_some();
        let next_link = next_page.map(link);
        let previous_link = previous_page.map(link);

        Self {
            cards: products.iter().map(ProductCard::from_product).collect(),
            query,
            has_next,
            has_previous,
            next_link,
            previous_link,
        }
    }
}

/// What the list currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    Loading,
    Failed(String),
    Empty,
    Loaded(ProductPage),
}

impl ListState {
    /// Status line shown instead of the list, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Loading => Some(LOADING_MESSAGE),
            Self::Failed(message) => Some(message.as_str()),
            Self::Empty => Some(EMPTY_MESSAGE),
            Self::Loaded(_) => None,
        }
    }

    fn from_result(
        query: ListQuery,
        result: Result<Vec<Product>, crate::ClientError>,
        page_size: i64,
    ) -> Self {
        match result {
            Ok(products) if products.is_empty() => Self::Empty,
            Ok(products) => Self::Loaded(ProductPage::build(query, &products, page_size)),
            Err(err) => {
                warn!(stage = "client", error = %err, "failed to load products");
                Self::Failed(LOAD_FAILED_MESSAGE.to_string())
            }
        }
    }
}

/// Result of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigateOutcome {
    Applied(ListState),
    /// A newer navigation started first; this result was dropped.
    Superseded,
}

/// Product list controller. Each navigation cancels the one before it.
#[derive(Clone)]
pub struct ProductListView {
    client: CatalogClient,
    page_size: i64,
    inner: Arc<Mutex<ViewInner>>,
}

struct ViewInner {
    token: CancellationToken,
    state: ListState,
}

impl ProductListView {
    pub fn new(client: CatalogClient) -> Self {
        Self::with_page_size(client, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(client: CatalogClient, page_size: i64) -> Self {
        Self {
            client,
            page_size: PageRequest::new(None, Some(page_size)).limit(),
            inner: Arc::new(Mutex::new(ViewInner {
                token: CancellationToken::new(),
                state: ListState::Loading,
            })),
        }
    }

    /// Current state as last applied.
    pub fn state(&self) -> ListState {
        self.lock().state.clone()
    }

    /// Loads the page described by `query_string`, superseding any in-flight load.
    pub async fn navigate(&self, query_string: &str) -> NavigateOutcome {
        let query = ListQuery::from_query_string(query_string);
        let token = self.begin();
        debug!(stage = "client", page = query.page, "navigating product list");

        let result = self
            .client
            .list_products(&query.params(self.page_size), &token)
            .await;
        if matches!(result, Err(ref err) if err.is_cancelled()) {
            return NavigateOutcome::Superseded;
        }

        let state = ListState::from_result(query, result, self.page_size);
        self.apply(&token, state)
    }

    fn begin(&self) -> CancellationToken {
        let mut inner = self.lock();
        inner.token.cancel();
        inner.token = CancellationToken::new();
        inner.state = ListState::Loading;
        inner.token.clone()
    }

    // Checked under the same lock `begin` cancels under, so a stale result can never land.
    fn apply(&self, token: &CancellationToken, state: ListState) -> NavigateOutcome {
        let mut inner = self.lock();
        if token.is_cancelled() {
            return NavigateOutcome::Superseded;
        }
        inner.state = state.clone();
        NavigateOutcome::Applied(state)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garage_core::{CategorySummary, DiscountUnit};
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;
    use uuid::Uuid;

    fn product(index: u128, discount: Decimal, unit: DiscountUnit) -> Product {
        Product {
            id: Uuid::from_u128(index),
            title: format!("Product {index}"),
            slug: format!("product-{index}"),
            description: String::new(),
            year: 2024,
            image_url: None,
            price: Decimal::new(200_000, 0),
            stock: 1,
            discount,
            discount_unit: unit,
            category: None,
        }
    }

    fn products_json(count: usize) -> serde_json::Value {
        let items: Vec<_> = (0..count)
            .map(|index| {
                serde_json::to_value(product(index as u128 + 1, Decimal::ZERO, DiscountUnit::Percent))
                    .expect("serialize")
            })
            .collect();
        json!(items)
    }

    fn view(server: &MockServer, page_size: i64) -> ProductListView {
        let base = Url::parse(&server.url("/api/")).expect("url");
        let client = CatalogClient::new(base, Client::builder().build().expect("client"));
        ProductListView::with_page_size(client, page_size)
    }

    #[test]
    fn query_string_round_trips_filters() {
        let query = ListQuery::from_query_string("?page=3&in_stock=false&category=brake%20pads");
        assert_eq!(query.page, 3);
        assert_eq!(query.filter.in_stock, Some(false));
        assert_eq!(query.filter.category_slug(), Some("brake pads"));
        assert_eq!(
            query.to_query_string(),
            "page=3&in_stock=false&category=brake+pads"
        );
    }

    #[test]
    fn invalid_page_falls_back_to_first() {
        for raw in ["page=0", "page=-2", "page=abc", ""] {
            assert_eq!(ListQuery::from_query_string(raw).page, 1, "input {raw:?}");
        }
    }

    #[test]
    fn params_follow_page_number() {
        let params = ListQuery::from_query_string("page=3&category=parts").params(20);
        assert_eq!(params.offset, Some(40));
        assert_eq!(params.limit, Some(20));
        assert_eq!(params.category.as_deref(), Some("parts"));
        assert_eq!(params.in_stock, None);
    }

    #[test]
    fn full_page_enables_next_link() {
        let products: Vec<_> = (1..=2)
            .map(|i| product(i, Decimal::ZERO, DiscountUnit::Percent))
            .collect();
        let page = ProductPage::build(ListQuery::from_query_string("page=1&in_stock=true"), &products, 2);
        assert!(page.has_next);
        assert!(!page.has_previous);
        assert_eq!(page.next_link.as_deref(), Some("?page=2&in_stock=true"));
        assert!(page.previous_link.is_none());
    }

    #[test]
    fn short_page_is_last() {
        let products = vec![product(1, Decimal::ZERO, DiscountUnit::Percent)];
        let page = ProductPage::build(ListQuery::default().with_page(4), &products, 2);
        assert!(!page.has_next);
        assert!(page.has_previous);
        assert_eq!(page.previous_link.as_deref(), Some("?page=3"));
    }

    #[test]
    fn cards_show_discounted_price_and_category_fallback() {
        let mut discounted = product(1, Decimal::new(25, 2), DiscountUnit::Fraction);
        discounted.category = Some(CategorySummary {
            id: Uuid::from_u128(9),
            name: "Parts".to_string(),
            slug: "parts".to_string(),
        });
        let card = ProductCard::from_product(&discounted);
        assert_eq!(card.price_label, "Rp\u{a0}200.000");
        assert_eq!(card.final_price_label, "Rp\u{a0}150.000");
        assert_eq!(card.discount_percent, Decimal::new(25, 0));
        assert!(card.has_discount);
        assert!(card.available);
        assert_eq!(card.category_label, "Parts");

        let mut sold_out = product(2, Decimal::ZERO, DiscountUnit::Percent);
        sold_out.stock = 0;
        let plain = ProductCard::from_product(&sold_out);
        assert_eq!(plain.final_price_label, plain.price_label);
        assert!(!plain.has_discount);
        assert!(!plain.available);
        assert_eq!(plain.category_label, UNCATEGORIZED);
    }

    #[test]
    fn last_representable_page_has_no_next_link() {
        let products: Vec<_> = (1..=2)
            .map(|i| product(i, Decimal::ZERO, DiscountUnit::Percent))
            .collect();
        let page = ProductPage::build(ListQuery::default().with_page(u32::MAX), &products, 2);
        assert!(!page.has_next);
        assert!(page.next_link.is_none());
        assert_eq!(
            page.previous_link,
            Some(format!("?page={}", u32::MAX - 1))
        );
    }

    #[tokio::test]
    async fn navigate_renders_populated_and_empty_states() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/products").query_param("offset", "0");
                then.status(200).json_body(products_json(2));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/products").query_param("offset", "2");
                then.status(200).json_body(json!([]));
            })
            .await;

        let view = view(&server, 2);
        let outcome = view.navigate("?page=1").await;
        match outcome {
            NavigateOutcome::Applied(ListState::Loaded(page)) => {
                assert_eq!(page.cards.len(), 2);
                assert!(page.has_next);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let outcome = view.navigate("?page=2").await;
        assert_eq!(outcome, NavigateOutcome::Applied(ListState::Empty));
        assert_eq!(view.state(), ListState::Empty);
        assert_eq!(view.state().message(), Some(EMPTY_MESSAGE));
    }

    #[tokio::test]
    async fn navigate_reports_generic_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/products");
                then.status(503).body("down");
            })
            .await;

        let view = view(&server, 20);
        let outcome = view.navigate("").await;
        assert_eq!(
            outcome,
            NavigateOutcome::Applied(ListState::Failed(LOAD_FAILED_MESSAGE.to_string()))
        );
    }

    #[tokio::test]
    async fn newer_navigation_supersedes_slow_one() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/products").query_param("offset", "0");
                then.status(200)
                    .delay(Duration::from_millis(400))
                    .json_body(products_json(1));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/products").query_param("offset", "20");
                then.status(200).json_body(json!([]));
            })
            .await;

        let view = view(&server, 20);
        let slow = {
            let view = view.clone();
            tokio::spawn(async move { view.navigate("page=1").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let fast = view.navigate("page=2").await;
        assert_eq!(fast, NavigateOutcome::Applied(ListState::Empty));

        let slow = slow.await.expect("join");
        assert_eq!(slow, NavigateOutcome::Superseded);
        assert_eq!(view.state(), ListState::Empty);
    }
}
