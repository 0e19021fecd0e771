//! Pagination bounds and filters accepted by the product listing query.

pub const DEFAULT_LIMIT: i64 = 10;
pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 100;

/// Offset/limit window, always clamped into the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    offset: i64,
    limit: i64,
}

impl PageRequest {
    /// Clamps `offset` to `>= 0` and `limit` to `[MIN_LIMIT, MAX_LIMIT]`.
    pub fn new(offset: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            offset: offset.unwrap_or(0).max(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(MIN_LIMIT, MAX_LIMIT),
        }
    }

    /// Parses raw query string values; unparsable values fall back to defaults.
    pub fn parse_lenient(offset: Option<&str>, limit: Option<&str>) -> Self {
        Self::new(offset.and_then(parse_int), limit.and_then(parse_int))
    }

    /// Window for a 1-based page number.
    pub fn for_page(page: u32, page_size: i64) -> Self {
        let limit = page_size.clamp(MIN_LIMIT, MAX_LIMIT);
        let page = i64::from(page.max(1));
        Self::new(Some((page - 1).saturating_mul(limit)), Some(limit))
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Optional filters; all present filters must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub in_stock: Option<bool>,
    category_slug: Option<String>,
}

impl ProductFilter {
    /// Builds a filter, treating a blank category slug as absent.
    pub fn new(in_stock: Option<bool>, category_slug: Option<String>) -> Self {
        Self {
            in_stock,
            category_slug: category_slug.filter(|slug| !slug.trim().is_empty()),
        }
    }

    pub fn category_slug(&self) -> Option<&str> {
        self.category_slug.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.in_stock.is_none() && self.category_slug.is_none()
    }
}

/// Complete listing request handed to the storage layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub page: PageRequest,
    pub filter: ProductFilter,
}

/// Parses `true/false/1/0`; anything else means "no filter".
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(value) => Some(value),
        // Out of range numerals saturate instead of falling back to the default.
        Err(_) if is_numeral(trimmed) => Some(if trimmed.starts_with('-') {
            i64::MIN
        } else {
            i64::MAX
        }),
        Err(_) => None,
    }
}

fn is_numeral(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
