//! Product query model and its reference semantics.
//!
//! [`matches_filter`], [`compare_products`], and [`paginate`] define what
//! a query means. The in-memory store executes them directly; the
//! Postgres store translates them to SQL and must agree with them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::products::Product;

pub const DEFAULT_PAGE_SIZE: u32 = 24;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Caller-facing query: `category_id` names one node and is expanded to
/// the node plus its descendants before execution.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub active: Option<bool>,
    pub featured: Option<bool>,
}

impl ProductQuery {
    /// Resolves the query into an executable filter given the expanded
    /// category id set (the requested node plus its descendants).
    #[must_use]
    pub fn into_filter(self, category_ids: Option<Vec<Uuid>>) -> ProductFilter {
        ProductFilter {
            search: self.search.and_then(trimmed),
            category_ids,
            brand: self.brand.and_then(trimmed),
            active: self.active,
            featured: self.featured,
        }
    }
}

/// Executable filter. All conditions are conjunctive; `None` means "no
/// constraint".
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_ids: Option<Vec<Uuid>>,
    pub brand: Option<String>,
    pub active: Option<bool>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Name,
    Brand,
    Sku,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// 1-based page request. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl PageRequest {
    /// Clamps the page to at least 1 and the page size into
    /// `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn normalized(self) -> Self {
        PageRequest {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
            ..self
        }
    }

    /// Offset of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size)
    }
}

/// One page of results plus the totals the storefront needs for paging
/// controls.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Assembles a page from pre-sliced items and the unpaged total.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        let page_size = request.page_size.max(1);
        let total_pages = u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX);
        Page {
            items,
            total,
            page: request.page.max(1),
            page_size,
            total_pages,
        }
    }
}

/// Reference predicate for [`ProductFilter`].
///
/// Search is a case-insensitive substring match over name, SKU, brand,
/// and description; the brand condition accepts either the display name
/// or the brand slug.
#[must_use]
pub fn matches_filter(product: &Product, filter: &ProductFilter) -> bool {
    if let Some(active) = filter.active {
        if product.active != active {
            return false;
        }
    }
    if let Some(featured) = filter.featured {
        if product.featured != featured {
            return false;
        }
    }
    if let Some(category_ids) = &filter.category_ids {
        if !category_ids.contains(&product.category_id) {
            return false;
        }
    }
    if let Some(brand) = &filter.brand {
        let wanted = brand.to_lowercase();
        let name_matches = product
            .brand
            .as_deref()
            .is_some_and(|b| b.to_lowercase() == wanted);
        let slug_matches = product.brand_slug.as_deref() == Some(wanted.as_str());
        if !name_matches && !slug_matches {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let haystacks = [
            Some(product.name.as_str()),
            Some(product.sku.as_str()),
            product.brand.as_deref(),
            product.description.as_deref(),
        ];
        let hit = haystacks
            .into_iter()
            .flatten()
            .any(|h| h.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    true
}

/// Reference ordering for [`SortBy`]/[`SortOrder`]. Ties fall back to the
/// slug so pagination is stable.
#[must_use]
pub fn compare_products(
    a: &Product,
    b: &Product,
    sort_by: SortBy,
    sort_order: SortOrder,
) -> Ordering {
    let primary = match sort_by {
        SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortBy::Brand => brand_key(a).cmp(&brand_key(b)),
        SortBy::Sku => crate::sku::normalize_sku(&a.sku).cmp(&crate::sku::normalize_sku(&b.sku)),
        SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    let ordered = match sort_order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    ordered.then_with(|| a.slug.cmp(&b.slug))
}

/// Sorts and slices an already filtered set into the requested page.
#[must_use]
pub fn paginate(mut items: Vec<Product>, request: &PageRequest) -> Page<Product> {
    let request = request.normalized();
    let total = items.len() as u64;
    items.sort_by(|a, b| compare_products(a, b, request.sort_by, request.sort_order));

    let start = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let page_items: Vec<Product> = if start >= items.len() {
        Vec::new()
    } else {
        items
            .into_iter()
            .skip(start)
            .take(request.page_size as usize)
            .collect()
    };
    Page::new(page_items, total, &request)
}

fn brand_key(product: &Product) -> Option<String> {
    product.brand.as_ref().map(|b| b.to_lowercase())
}

fn trimmed(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}
