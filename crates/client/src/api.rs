use garage_core::{CategorySummary, Product};
use garage_util::ClientConfig;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::cancel::CancellationToken;

/// Client for the catalog HTTP API.
#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: Url,
}

impl CatalogClient {
    /// Creates a client; `base_url` should end with `/` so relative paths join below it.
    pub fn new(base_url: Url, http: Client) -> Self {
        Self { http, base_url }
    }

    /// Builds a client with the configured base URL and request timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.api_base_url)?;
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self::new(base_url, http))
    }

    /// Fetches one page of products. Resolves to [`ClientError::Cancelled`] once
    /// `cancel` fires, even if a response is already on its way.
    pub async fn list_products(
        &self,
        params: &ListProductsParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<Product>, ClientError> {
        let mut url = self.base_url.join("products")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(offset) = params.offset {
                query.append_pair("offset", &offset.to_string());
            }
            if let Some(limit) = params.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(in_stock) = params.in_stock {
                query.append_pair("in_stock", if in_stock { "true" } else { "false" });
            }
            if let Some(category) = params.category.as_deref() {
                query.append_pair("category", category);
            }
        }
        // Drop a dangling `?` when no parameters were appended.
        if url.query() == Some("") {
            url.set_query(None);
        }

        debug!(stage = "client", %url, "fetching products");
        self.send_cancellable(self.http.get(url), cancel).await
    }

    /// Fetches a single product by slug or id.
    pub async fn product(&self, key: &str) -> Result<Product, ClientError> {
        let url = self.resource_url("products", key)?;
        parse_json(self.http.get(url).send().await?).await
    }

    /// Fetches all categories.
    pub async fn categories(&self) -> Result<Vec<CategorySummary>, ClientError> {
        let url = self.base_url.join("categories")?;
        parse_json(self.http.get(url).send().await?).await
    }

    /// Fetches a single category by slug or id.
    pub async fn category(&self, key: &str) -> Result<CategorySummary, ClientError> {
        let url = self.resource_url("categories", key)?;
        parse_json(self.http.get(url).send().await?).await
    }

    fn resource_url(&self, collection: &str, key: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.join(collection)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(key);
        Ok(url)
    }

    async fn send_cancellable<T>(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = async {
                match request.send().await {
                    Ok(response) => parse_json::<T>(response).await,
                    Err(err) => Err(ClientError::from(err)),
                }
            } => result,
        };

        // A response that raced with cancellation is discarded.
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        result
    }
}

/// Query parameters accepted by `GET /products`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListProductsParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub in_stock: Option<bool>,
    pub category: Option<String>,
}

/// Errors produced by the catalog client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("resource not found")]
    NotFound,
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("request was cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

async fn parse_json<T>(response: Response) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound);
    }
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(ClientError::Status { status, body });
    }

    Ok(response.json().await?)
}
