//! Catalog domain types shared by the server, storage and client crates.

pub mod paging;
pub mod pricing;
pub mod types;

pub use paging::{PageRequest, ProductFilter, ProductQuery};
pub use types::{Category, CategorySummary, DiscountUnit, LookupKey, Product};
