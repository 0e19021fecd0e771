use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Category persisted in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Returns the public projection exposed by the API.
    pub fn summary(&self) -> CategorySummary {
        CategorySummary {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }
}

/// Category fields embedded in API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Product as returned by list and lookup queries, enriched with its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub year: i32,
    #[serde(default)]
    pub image_url: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub discount: Decimal,
    pub discount_unit: DiscountUnit,
    pub category: Option<CategorySummary>,
}

impl Product {
    /// Stock at or below zero means the product cannot be ordered.
    pub fn is_available(&self) -> bool {
        self.stock > 0
    }
}

/// Unit the stored `discount` value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountUnit {
    /// Whole percentage, `15` means 15%.
    Percent,
    /// Fraction of one, `0.15` means 15%.
    Fraction,
}

impl DiscountUnit {
    /// Returns the canonical database representation for the unit.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Percent => "percent",
            Self::Fraction => "fraction",
        }
    }
}

impl fmt::Display for DiscountUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountUnit {
    type Err = UnknownDiscountUnit;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "percent" => Ok(Self::Percent),
            "fraction" => Ok(Self::Fraction),
            other => Err(UnknownDiscountUnit(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown discount unit '{0}'")]
pub struct UnknownDiscountUnit(pub String);

/// Key accepted by single resource lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
///
/// `Id` keeps the segment exactly as received: `Uuid::parse_str` also accepts
/// simple, braced and upper-case forms, any of which may be a real slug.
pub enum LookupKey {
    Id { id: Uuid, raw: String },
    Slug(String),
}

impl LookupKey {
    /// Interprets a path segment: anything that parses as a UUID is an identifier.
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => Self::Id {
                id,
                raw: raw.to_string(),
            },
            Err(_) => Self::Slug(raw.to_string()),
        }
    }

    /// Key for a known identifier, in its hyphenated form.
    pub fn from_id(id: Uuid) -> Self {
        Self::Id {
            id,
            raw: id.to_string(),
        }
    }

    /// Returns the key exactly as it appeared in the URL.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Id { raw, .. } => raw,
            Self::Slug(slug) => slug,
        }
    }
}
