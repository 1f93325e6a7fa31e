//! Product catalog service: validated writes, the global SKU namespace,
//! slug derivation, and storefront queries.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use grifo_core::{
    sku::normalize_sku, slug::slugify, validate::validate_product_draft, Page, PageRequest,
    Product, ProductDraft, ProductQuery, ProductUpdate,
};

use crate::cache::RecountFlag;
use crate::store::CatalogStore;
use crate::tree::CategoryTree;
use crate::CatalogError;

pub struct ProductCatalog {
    store: Arc<dyn CatalogStore>,
    tree: Arc<CategoryTree>,
    recount: RecountFlag,
}

impl ProductCatalog {
    #[must_use]
    pub fn new(
        store: Arc<dyn CatalogStore>,
        tree: Arc<CategoryTree>,
        recount: RecountFlag,
    ) -> Self {
        Self {
            store,
            tree,
            recount,
        }
    }

    /// # Errors
    ///
    /// Returns [`CatalogError::ProductNotFound`] if no product has this id.
    pub async fn get(&self, id: Uuid) -> Result<Product, CatalogError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))
    }

    /// Every product, ordered by name. Used by exports and the image
    /// verification pass.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the product list cannot be read.
    pub async fn list_all(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.list_products().await?)
    }

    /// `true` when no product owns the SKU, in any of its base, color, or
    /// measurement slots. `exclude` skips one product's own reservations.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the reservation lookup fails.
    pub async fn is_sku_available(
        &self,
        sku: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, CatalogError> {
        let owner = self.store.sku_owner(&normalize_sku(sku), exclude).await?;
        Ok(owner.is_none())
    }

    /// Validates and inserts a product.
    ///
    /// Derived fields never come from the caller: the slug comes from the
    /// name (uniquified against existing product slugs and then frozen),
    /// the brand slug from the brand, and the category breadcrumb from the
    /// cached tree snapshot. Every SKU the product occupies is checked
    /// against the global namespace before the write, and unique-constraint
    /// races surface as the same validation message.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] with the full message list when
    /// the draft is rejected.
    pub async fn create(&self, draft: ProductDraft) -> Result<Product, CatalogError> {
        let mut messages = validate_product_draft(&draft);

        let name = draft.name.trim().to_string();
        let base_slug = slugify(&name);
        if !name.is_empty() && base_slug.is_empty() {
            messages.push(format!("name '{name}' produces an empty slug"));
        }

        let mut category = None;
        if let Some(category_id) = draft.category_id {
            match self.tree.get(category_id).await {
                Ok(found) => {
                    if !found.active {
                        messages.push(format!("category '{}' is inactive", found.slug));
                    }
                    category = Some(found);
                }
                Err(CatalogError::CategoryNotFound(_)) => {
                    messages.push(format!("category '{category_id}' not found"));
                }
                Err(other) => return Err(other),
            }
        }

        for sku in draft_skus(&draft) {
            if self.store.sku_owner(&sku, None).await?.is_some() {
                messages.push(format!("sku '{sku}' is already in use"));
            }
        }

        if !messages.is_empty() {
            return Err(CatalogError::Validation(messages));
        }
        let Some(category) = category else {
            return Err(CatalogError::Validation(vec![
                "category is required".to_string()
            ]));
        };

        let mut slug = base_slug.clone();
        let mut suffix = 1;
        while self.store.product_slug_taken(&slug).await? {
            slug = format!("{base_slug}-{suffix}");
            suffix += 1;
        }

        let breadcrumb = self.tree.breadcrumb(category.id).await?;
        let brand = trimmed_opt(draft.brand);
        let brand_slug = brand
            .as_deref()
            .map(slugify)
            .filter(|brand_slug| !brand_slug.is_empty());

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name,
            slug,
            sku: normalize_sku(&draft.sku),
            description: trimmed_opt(draft.description),
            brand,
            brand_slug,
            category_id: category.id,
            category_breadcrumb: breadcrumb,
            attributes: draft.attributes,
            default_image: draft.default_image,
            color_variants: normalized_color_variants(draft.color_variants),
            measurements: draft.measurements.map(normalized_measurements),
            active: draft.active,
            featured: draft.featured,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert_product(&product)
            .await
            .map_err(CatalogError::from_write)?;
        self.recount.mark();
        Ok(product)
    }

    /// Applies a partial update and revalidates the merged draft.
    ///
    /// The product slug never changes after creation; stored links stay
    /// stable across renames. A category move re-reads the breadcrumb and
    /// is rejected when the target category is missing or inactive.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ProductNotFound`] for an unknown id and
    /// [`CatalogError::Validation`] when the merged draft is rejected.
    pub async fn update(&self, id: Uuid, update: ProductUpdate) -> Result<Product, CatalogError> {
        let existing = self.get(id).await?;
        let draft = update.apply_to(&existing);
        let mut messages = validate_product_draft(&draft);

        let moved = draft.category_id != Some(existing.category_id);
        let mut category_id = existing.category_id;
        if let Some(target) = draft.category_id {
            if moved {
                match self.tree.get(target).await {
                    Ok(found) if !found.active => {
                        messages.push(format!("category '{}' is inactive", found.slug));
                    }
                    Ok(_) => category_id = target,
                    Err(CatalogError::CategoryNotFound(_)) => {
                        messages.push(format!("category '{target}' not found"));
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        for sku in draft_skus(&draft) {
            if self.store.sku_owner(&sku, Some(id)).await?.is_some() {
                messages.push(format!("sku '{sku}' is already in use"));
            }
        }

        if !messages.is_empty() {
            return Err(CatalogError::Validation(messages));
        }

        let breadcrumb = self.tree.breadcrumb(category_id).await?;
        let brand = trimmed_opt(draft.brand);
        let brand_slug = brand
            .as_deref()
            .map(slugify)
            .filter(|brand_slug| !brand_slug.is_empty());

        let product = Product {
            id,
            name: draft.name.trim().to_string(),
            slug: existing.slug.clone(),
            sku: normalize_sku(&draft.sku),
            description: trimmed_opt(draft.description),
            brand,
            brand_slug,
            category_id,
            category_breadcrumb: breadcrumb,
            attributes: draft.attributes,
            default_image: draft.default_image,
            color_variants: normalized_color_variants(draft.color_variants),
            measurements: draft.measurements.map(normalized_measurements),
            active: draft.active,
            featured: draft.featured,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        self.store
            .update_product(&product)
            .await
            .map_err(CatalogError::from_write)?;
        if product.active != existing.active || product.category_id != existing.category_id {
            self.recount.mark();
        }
        Ok(product)
    }

    /// Marks the product inactive. Idempotent; the row and its SKU
    /// reservations are kept.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ProductNotFound`] if no product has this id.
    pub async fn soft_delete(&self, id: Uuid) -> Result<Product, CatalogError> {
        let existing = self.get(id).await?;
        if !existing.active {
            return Ok(existing);
        }
        let mut next = existing;
        next.active = false;
        next.updated_at = Utc::now();
        self.store
            .update_product(&next)
            .await
            .map_err(CatalogError::from_write)?;
        self.recount.mark();
        Ok(next)
    }

    /// Filtered, sorted, paginated product listing.
    ///
    /// A category filter covers the category and its whole subtree. An
    /// unknown category id yields an empty page rather than an error, so
    /// stale storefront links degrade quietly.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the query fails.
    pub async fn query(
        &self,
        query: ProductQuery,
        page: &PageRequest,
    ) -> Result<Page<Product>, CatalogError> {
        let category_ids = match query.category_id {
            Some(category_id) => {
                let index = self.tree.index().await?;
                if index.get(category_id).is_none() {
                    return Ok(Page::new(Vec::new(), 0, &page.normalized()));
                }
                Some(index.expand_with_descendants(category_id))
            }
            None => None,
        };
        let filter = query.into_filter(category_ids);
        Ok(self.store.query_products(&filter, page).await?)
    }
}

/// Every SKU the draft would occupy, normalized and deduplicated. Blank
/// entries are skipped; the shape validation already reports those.
fn draft_skus(draft: &ProductDraft) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut skus = Vec::new();
    for raw in draft.all_skus() {
        let sku = normalize_sku(raw);
        if !sku.is_empty() && seen.insert(sku.clone()) {
            skus.push(sku);
        }
    }
    skus
}

fn trimmed_opt(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn normalized_color_variants(
    variants: Vec<grifo_core::ColorVariant>,
) -> Vec<grifo_core::ColorVariant> {
    variants
        .into_iter()
        .map(|mut variant| {
            variant.sku = normalize_sku(&variant.sku);
            variant
        })
        .collect()
}

fn normalized_measurements(mut measurements: grifo_core::Measurements) -> grifo_core::Measurements {
    for variant in &mut measurements.variants {
        variant.sku = normalize_sku(&variant.sku);
    }
    measurements
}
