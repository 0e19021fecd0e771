//! HTTP client and list view for the catalog API.

pub mod api;
pub mod cancel;
pub mod view;

pub use api::{CatalogClient, ClientError, ListProductsParams};
pub use cancel::CancellationToken;
pub use view::{ListQuery, ListState, NavigateOutcome, ProductCard, ProductListView, ProductPage};
