//! Postgres [`CatalogStore`] implementation.
//!
//! Services hand this store fully computed rows; every query here is
//! plain runtime sqlx against the migration schema. Unique violations are
//! translated to [`StoreError::Duplicate`] by constraint name so services
//! can turn them into validation messages.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use grifo_core::{
    AttributePair, Category, CategoryKind, ColorVariant, Measurements, Page, PageRequest, Product,
    ProductFilter, SortBy, SortOrder,
};

use crate::store::{CatalogStore, StoreError};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, parent_id, level, kind, sort_order, \
     active, product_count, total_product_count, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, slug, sku, description, brand, brand_slug, category_id, \
     category_breadcrumb, attributes, default_image, color_variants, measurements, \
     active, featured, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<Uuid>,
    level: i16,
    kind: String,
    sort_order: i32,
    active: bool,
    product_count: i64,
    total_product_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        let kind = match row.kind.as_str() {
            "sub" => CategoryKind::Sub,
            "main" => CategoryKind::Main,
            _ => CategoryKind::for_level(row.level),
        };
        Category {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            parent_id: row.parent_id,
            level: row.level,
            kind,
            sort_order: row.sort_order,
            active: row.active,
            product_count: row.product_count,
            total_product_count: row.total_product_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    sku: String,
    description: Option<String>,
    brand: Option<String>,
    brand_slug: Option<String>,
    category_id: Uuid,
    category_breadcrumb: Option<String>,
    attributes: Json<Vec<AttributePair>>,
    default_image: Option<String>,
    color_variants: Json<Vec<ColorVariant>>,
    measurements: Option<Json<Measurements>>,
    active: bool,
    featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            slug: row.slug,
            sku: row.sku,
            description: row.description,
            brand: row.brand,
            brand_slug: row.brand_slug,
            category_id: row.category_id,
            category_breadcrumb: row.category_breadcrumb,
            attributes: row.attributes.0,
            default_image: row.default_image,
            color_variants: row.color_variants.0,
            measurements: row.measurements.map(|m| m.0),
            active: row.active,
            featured: row.featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Error translation
// ---------------------------------------------------------------------------

fn category_write_error(err: sqlx::Error, category: &Category) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                field: "slug",
                value: category.slug.clone(),
            };
        }
    }
    StoreError::Sqlx(err)
}

fn product_write_error(err: sqlx::Error, product: &Product) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some("products_sku_unique") => StoreError::Duplicate {
                    field: "sku",
                    value: product.sku.clone(),
                },
                Some("products_slug_unique") => StoreError::Duplicate {
                    field: "slug",
                    value: product.slug.clone(),
                },
                _ => StoreError::Duplicate {
                    field: "sku",
                    value: product.sku.clone(),
                },
            };
        }
    }
    StoreError::Sqlx(err)
}

fn reservation_write_error(err: sqlx::Error, sku: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                field: "sku",
                value: sku.to_string(),
            };
        }
    }
    StoreError::Sqlx(err)
}

/// Every SKU a product occupies, tagged with the reservation kind.
fn sku_rows(product: &Product) -> Vec<(&str, &'static str)> {
    let mut rows = vec![(product.sku.as_str(), "base")];
    rows.extend(
        product
            .color_variants
            .iter()
            .map(|v| (v.sku.as_str(), "color")),
    );
    if let Some(measurements) = &product.measurements {
        rows.extend(
            measurements
                .variants
                .iter()
                .map(|v| (v.sku.as_str(), "measurement")),
        );
    }
    rows
}

/// Escapes LIKE wildcards in a search term; backslash is the Postgres
/// default escape character.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn order_clause(sort_by: SortBy, sort_order: SortOrder) -> &'static str {
    // Secondary slug sort keeps pagination stable. NULL brands sort the
    // same way Option<String> does in the in-memory path: first when
    // ascending.
    match (sort_by, sort_order) {
        (SortBy::Name, SortOrder::Asc) => "LOWER(name) ASC, slug ASC",
        (SortBy::Name, SortOrder::Desc) => "LOWER(name) DESC, slug ASC",
        (SortBy::Brand, SortOrder::Asc) => "LOWER(brand) ASC NULLS FIRST, slug ASC",
        (SortBy::Brand, SortOrder::Desc) => "LOWER(brand) DESC NULLS LAST, slug ASC",
        (SortBy::Sku, SortOrder::Asc) => "UPPER(sku) ASC, slug ASC",
        (SortBy::Sku, SortOrder::Desc) => "UPPER(sku) DESC, slug ASC",
        (SortBy::CreatedAt, SortOrder::Asc) => "created_at ASC, slug ASC",
        (SortBy::CreatedAt, SortOrder::Desc) => "created_at DESC, slug ASC",
    }
}

const PRODUCT_FILTER_WHERE: &str = "($1::TEXT IS NULL \
        OR name ILIKE '%' || $1 || '%' \
        OR sku ILIKE '%' || $1 || '%' \
        OR COALESCE(brand, '') ILIKE '%' || $1 || '%' \
        OR COALESCE(description, '') ILIKE '%' || $1 || '%') \
    AND ($2::UUID[] IS NULL OR category_id = ANY($2)) \
    AND ($3::TEXT IS NULL OR LOWER(COALESCE(brand, '')) = LOWER($3) OR brand_slug = LOWER($3)) \
    AND ($4::BOOL IS NULL OR active = $4) \
    AND ($5::BOOL IS NULL OR featured = $5)";

// ---------------------------------------------------------------------------
// CatalogStore implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY level, sort_order, slug"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO categories \
                 (id, name, slug, description, parent_id, level, kind, sort_order, \
                  active, product_count, total_product_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.parent_id)
        .bind(category.level)
        .bind(category.kind.to_string())
        .bind(category.sort_order)
        .bind(category.active)
        .bind(category.product_count)
        .bind(category.total_product_count)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| category_write_error(e, category))?;
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE categories SET \
                 name = $2, slug = $3, description = $4, parent_id = $5, level = $6, \
                 kind = $7, sort_order = $8, active = $9, updated_at = $10 \
             WHERE id = $1",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.parent_id)
        .bind(category.level)
        .bind(category.kind.to_string())
        .bind(category.sort_order)
        .bind(category.active)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| category_write_error(e, category))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "category",
                id: category.id,
            });
        }
        Ok(())
    }

    async fn update_category_levels(&self, levels: &[(Uuid, i16)]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (id, level) in levels {
            sqlx::query(
                "UPDATE categories SET level = $2, kind = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(level)
            .bind(CategoryKind::for_level(*level).to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn write_category_counts(&self, counts: &[(Uuid, i64, i64)]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (id, direct, total) in counts {
            sqlx::query(
                "UPDATE categories SET product_count = $2, total_product_count = $3 WHERE id = $1",
            )
            .bind(id)
            .bind(direct)
            .bind(total)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY LOWER(name), slug"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO products \
                 (id, name, slug, sku, description, brand, brand_slug, category_id, \
                  category_breadcrumb, attributes, default_image, color_variants, \
                  measurements, active, featured, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(&product.brand_slug)
        .bind(product.category_id)
        .bind(&product.category_breadcrumb)
        .bind(Json(&product.attributes))
        .bind(&product.default_image)
        .bind(Json(&product.color_variants))
        .bind(product.measurements.as_ref().map(Json))
        .bind(product.active)
        .bind(product.featured)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| product_write_error(e, product))?;

        for (sku, kind) in sku_rows(product) {
            sqlx::query("INSERT INTO product_skus (sku, product_id, kind) VALUES ($1, $2, $3)")
                .bind(sku)
                .bind(product.id)
                .bind(kind)
                .execute(&mut *tx)
                .await
                .map_err(|e| reservation_write_error(e, sku))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE products SET \
                 name = $2, slug = $3, sku = $4, description = $5, brand = $6, \
                 brand_slug = $7, category_id = $8, category_breadcrumb = $9, \
                 attributes = $10, default_image = $11, color_variants = $12, \
                 measurements = $13, active = $14, featured = $15, updated_at = $16 \
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(&product.brand_slug)
        .bind(product.category_id)
        .bind(&product.category_breadcrumb)
        .bind(Json(&product.attributes))
        .bind(&product.default_image)
        .bind(Json(&product.color_variants))
        .bind(product.measurements.as_ref().map(Json))
        .bind(product.active)
        .bind(product.featured)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| product_write_error(e, product))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "product",
                id: product.id,
            });
        }

        sqlx::query("DELETE FROM product_skus WHERE product_id = $1")
            .bind(product.id)
            .execute(&mut *tx)
            .await?;
        for (sku, kind) in sku_rows(product) {
            sqlx::query("INSERT INTO product_skus (sku, product_id, kind) VALUES ($1, $2, $3)")
                .bind(sku)
                .bind(product.id)
                .bind(kind)
                .execute(&mut *tx)
                .await
                .map_err(|e| reservation_write_error(e, sku))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query_products(
        &self,
        filter: &ProductFilter,
        page: &PageRequest,
    ) -> Result<Page<Product>, StoreError> {
        let page = page.normalized();
        let search = filter.search.as_deref().map(escape_like);

        let total: i64 = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM products WHERE {PRODUCT_FILTER_WHERE}"
        ))
        .bind(&search)
        .bind(&filter.category_ids)
        .bind(&filter.brand)
        .bind(filter.active)
        .bind(filter.featured)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE {PRODUCT_FILTER_WHERE} \
             ORDER BY {} \
             LIMIT $6 OFFSET $7",
            order_clause(page.sort_by, page.sort_order)
        ))
        .bind(&search)
        .bind(&filter.category_ids)
        .bind(&filter.brand)
        .bind(filter.active)
        .bind(filter.featured)
        .bind(i64::from(page.page_size))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<Product> = rows.into_iter().map(Product::from).collect();
        Ok(Page::new(items, u64::try_from(total.max(0)).unwrap_or(0), &page))
    }

    async fn sku_owner(
        &self,
        normalized_sku: &str,
        exclude: Option<Uuid>,
    ) -> Result<Option<Uuid>, StoreError> {
        let owner = sqlx::query_scalar::<_, Uuid>(
            "SELECT product_id FROM product_skus \
             WHERE LOWER(sku) = LOWER($1) AND ($2::UUID IS NULL OR product_id <> $2) \
             LIMIT 1",
        )
        .bind(normalized_sku)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn product_slug_taken(&self, slug: &str) -> Result<bool, StoreError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE slug = $1)",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn count_active_products_by_category(
        &self,
    ) -> Result<HashMap<Uuid, i64>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT category_id, COUNT(*) FROM products WHERE active = TRUE GROUP BY category_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn update_breadcrumbs(
        &self,
        per_category: &[(Uuid, String)],
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut touched = 0u64;
        for (category_id, breadcrumb) in per_category {
            let result =
                sqlx::query("UPDATE products SET category_breadcrumb = $2 WHERE category_id = $1")
                    .bind(category_id)
                    .bind(breadcrumb)
                    .execute(&mut *tx)
                    .await?;
            touched += result.rows_affected();
        }
        tx.commit().await?;
        Ok(touched)
    }
}
