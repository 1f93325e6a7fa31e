//! The persistence seam of the catalog.
//!
//! Services talk to a [`CatalogStore`] trait object, never to Postgres
//! directly. [`crate::PgStore`] is the production implementation;
//! [`crate::MemoryStore`] backs offline tests and mirrors the same
//! uniqueness rules so service behavior can be exercised without a
//! database.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use grifo_core::{Category, Page, PageRequest, Product, ProductFilter};

/// Store-level failures. `Duplicate` is the normalized form of a unique
/// constraint violation; services translate it into a validation message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("duplicate {field}: '{value}' already exists")]
    Duplicate { field: &'static str, value: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Storage operations the catalog needs, split between the two
/// collections. Writes are full-row: services compute the final record
/// (slug, level, breadcrumb, timestamps) and the store persists it.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    /// Every category, active or not, ordered by `(level, sort_order, slug)`.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError>;

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;

    /// Full-row update. Fails with `NotFound` when the id does not exist.
    async fn update_category(&self, category: &Category) -> Result<(), StoreError>;

    /// Applies recomputed `(id, level)` pairs after a reparent, deriving
    /// `kind` from the level. All-or-nothing.
    async fn update_category_levels(&self, levels: &[(Uuid, i16)]) -> Result<(), StoreError>;

    /// Writes `(id, product_count, total_product_count)` rollups.
    async fn write_category_counts(&self, counts: &[(Uuid, i64, i64)]) -> Result<(), StoreError>;

    // -----------------------------------------------------------------------
    // Products
    // -----------------------------------------------------------------------

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    /// Every product, ordered by name. Used by dedup prefetch and image
    /// verification, both of which genuinely want the whole catalog.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Inserts the product and reserves every SKU it occupies.
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Full-row update, refreshing the product's SKU reservations.
    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn query_products(
        &self,
        filter: &ProductFilter,
        page: &PageRequest,
    ) -> Result<Page<Product>, StoreError>;

    /// The product currently holding `sku` (normalized case-insensitively,
    /// base or variant), excluding `exclude` when given.
    async fn sku_owner(
        &self,
        normalized_sku: &str,
        exclude: Option<Uuid>,
    ) -> Result<Option<Uuid>, StoreError>;

    async fn product_slug_taken(&self, slug: &str) -> Result<bool, StoreError>;

    /// Active products grouped by their direct category.
    async fn count_active_products_by_category(
        &self,
    ) -> Result<HashMap<Uuid, i64>, StoreError>;

    /// Rewrites the denormalized breadcrumb for every product directly in
    /// each listed category. Returns the number of products touched.
    async fn update_breadcrumbs(
        &self,
        per_category: &[(Uuid, String)],
    ) -> Result<u64, StoreError>;
}
