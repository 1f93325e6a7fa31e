//! In-memory [`CatalogStore`] used by offline tests and dry explorations.
//!
//! It enforces the same uniqueness rules as the Postgres schema (unique
//! category slug, unique product slug, one global case-insensitive SKU
//! namespace) so services behave identically against either backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use grifo_core::filter::{matches_filter, paginate};
use grifo_core::sku::normalize_sku;
use grifo_core::{Category, CategoryKind, Page, PageRequest, Product, ProductFilter};

use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Default)]
struct MemoryInner {
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    /// Normalized SKU -> owning product, the reservation table.
    skus: HashMap<String, Uuid>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored products, for test assertions.
    pub async fn product_count(&self) -> usize {
        self.inner.read().await.products.len()
    }
}

fn reservation_conflict(
    skus: &HashMap<String, Uuid>,
    product: &Product,
) -> Result<Vec<String>, StoreError> {
    let mut reservations = Vec::new();
    for sku in product.all_skus() {
        let normalized = normalize_sku(sku);
        match skus.get(&normalized) {
            Some(owner) if *owner != product.id => {
                return Err(StoreError::Duplicate {
                    field: "sku",
                    value: sku.to_string(),
                });
            }
            _ => reservations.push(normalized),
        }
    }
    Ok(reservations)
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.read().await;
        let mut categories: Vec<Category> = inner.categories.values().cloned().collect();
        categories.sort_by(|a, b| {
            (a.level, a.sort_order, a.slug.as_str()).cmp(&(b.level, b.sort_order, b.slug.as_str()))
        });
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self.inner.read().await.categories.get(&id).cloned())
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.categories.values().any(|c| c.slug == category.slug) {
            return Err(StoreError::Duplicate {
                field: "slug",
                value: category.slug.clone(),
            });
        }
        inner.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.categories.contains_key(&category.id) {
            return Err(StoreError::NotFound {
                entity: "category",
                id: category.id,
            });
        }
        if inner
            .categories
            .values()
            .any(|c| c.id != category.id && c.slug == category.slug)
        {
            return Err(StoreError::Duplicate {
                field: "slug",
                value: category.slug.clone(),
            });
        }
        inner.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category_levels(&self, levels: &[(Uuid, i16)]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for (id, _) in levels {
            if !inner.categories.contains_key(id) {
                return Err(StoreError::NotFound {
                    entity: "category",
                    id: *id,
                });
            }
        }
        for (id, level) in levels {
            if let Some(category) = inner.categories.get_mut(id) {
                category.level = *level;
                category.kind = CategoryKind::for_level(*level);
            }
        }
        Ok(())
    }

    async fn write_category_counts(&self, counts: &[(Uuid, i64, i64)]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for (id, direct, total) in counts {
            if let Some(category) = inner.categories.get_mut(id) {
                category.product_count = *direct;
                category.total_product_count = *total;
            }
        }
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> = inner.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(products)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.products.values().any(|p| p.slug == product.slug) {
            return Err(StoreError::Duplicate {
                field: "slug",
                value: product.slug.clone(),
            });
        }
        // Check every reservation before taking any, so a rejected insert
        // leaves nothing behind.
        let reservations = reservation_conflict(&inner.skus, product)?;
        for normalized in reservations {
            inner.skus.insert(normalized, product.id);
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.products.contains_key(&product.id) {
            return Err(StoreError::NotFound {
                entity: "product",
                id: product.id,
            });
        }
        if inner
            .products
            .values()
            .any(|p| p.id != product.id && p.slug == product.slug)
        {
            return Err(StoreError::Duplicate {
                field: "slug",
                value: product.slug.clone(),
            });
        }
        let reservations = reservation_conflict(&inner.skus, product)?;
        inner.skus.retain(|_, owner| *owner != product.id);
        for normalized in reservations {
            inner.skus.insert(normalized, product.id);
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn query_products(
        &self,
        filter: &ProductFilter,
        page: &PageRequest,
    ) -> Result<Page<Product>, StoreError> {
        let inner = self.inner.read().await;
        let matched: Vec<Product> = inner
            .products
            .values()
            .filter(|p| matches_filter(p, filter))
            .cloned()
            .collect();
        Ok(paginate(matched, page))
    }

    async fn sku_owner(
        &self,
        normalized_sku: &str,
        exclude: Option<Uuid>,
    ) -> Result<Option<Uuid>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .skus
            .get(normalized_sku)
            .copied()
            .filter(|owner| Some(*owner) != exclude))
    }

    async fn product_slug_taken(&self, slug: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.products.values().any(|p| p.slug == slug))
    }

    async fn count_active_products_by_category(
        &self,
    ) -> Result<HashMap<Uuid, i64>, StoreError> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for product in inner.products.values().filter(|p| p.active) {
            *counts.entry(product.category_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn update_breadcrumbs(
        &self,
        per_category: &[(Uuid, String)],
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut touched = 0u64;
        for (category_id, breadcrumb) in per_category {
            for product in inner
                .products
                .values_mut()
                .filter(|p| p.category_id == *category_id)
            {
                product.category_breadcrumb = Some(breadcrumb.clone());
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use grifo_core::slug::slugify;

    use super::*;

    fn category(name: &str) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slugify(name),
            description: None,
            parent_id: None,
            level: 0,
            kind: CategoryKind::Main,
            sort_order: 0,
            active: true,
            product_count: 0,
            total_product_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product(name: &str, sku: &str, category_id: Uuid) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slugify(name),
            sku: sku.to_string(),
            description: None,
            brand: None,
            brand_slug: None,
            category_id,
            category_breadcrumb: None,
            attributes: Vec::new(),
            default_image: None,
            color_variants: Vec::new(),
            measurements: None,
            active: true,
            featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_category_slug_is_rejected() {
        let store = MemoryStore::new();
        store.insert_category(&category("Baños")).await.unwrap();
        let err = store.insert_category(&category("Baños")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate { field: "slug", .. }
        ));
    }

    #[tokio::test]
    async fn sku_conflicts_are_case_insensitive() {
        let store = MemoryStore::new();
        let c = category("Plomería");
        store.insert_category(&c).await.unwrap();
        store
            .insert_product(&product("Tubo", "PVC-110", c.id))
            .await
            .unwrap();

        let err = store
            .insert_product(&product("Otro tubo", "pvc-110", c.id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "sku", .. }));
        // The failed insert left nothing behind.
        assert_eq!(store.product_count().await, 1);
        assert!(!store.product_slug_taken("otro-tubo").await.unwrap());
    }

    #[tokio::test]
    async fn variant_skus_join_the_global_namespace() {
        let store = MemoryStore::new();
        let c = category("Plomería");
        store.insert_category(&c).await.unwrap();

        let mut with_variant = product("Llave Roma", "ROMA-1", c.id);
        with_variant.color_variants.push(grifo_core::ColorVariant {
            color_name: "Cromo".to_string(),
            color_code: "#C0C0C0".to_string(),
            image: Some("https://cdn.example.com/roma-cr.jpg".to_string()),
            sku: "ROMA-1-CR".to_string(),
            active: true,
        });
        store.insert_product(&with_variant).await.unwrap();

        // Another product claiming the variant SKU as its base is refused.
        let err = store
            .insert_product(&product("Impostor", "roma-1-cr", c.id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "sku", .. }));
    }

    #[tokio::test]
    async fn update_releases_old_sku_reservations() {
        let store = MemoryStore::new();
        let c = category("Plomería");
        store.insert_category(&c).await.unwrap();
        let mut p = product("Tubo", "PVC-110", c.id);
        store.insert_product(&p).await.unwrap();

        p.sku = "PVC-160".to_string();
        store.update_product(&p).await.unwrap();

        assert_eq!(store.sku_owner("PVC-160", None).await.unwrap(), Some(p.id));
        assert_eq!(store.sku_owner("PVC-110", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sku_owner_can_exclude_the_product_itself() {
        let store = MemoryStore::new();
        let c = category("Plomería");
        store.insert_category(&c).await.unwrap();
        let p = product("Tubo", "PVC-110", c.id);
        store.insert_product(&p).await.unwrap();

        assert_eq!(store.sku_owner("PVC-110", None).await.unwrap(), Some(p.id));
        assert_eq!(store.sku_owner("PVC-110", Some(p.id)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn count_active_products_groups_by_category() {
        let store = MemoryStore::new();
        let a = category("Plomería");
        let b = category("Baños");
        store.insert_category(&a).await.unwrap();
        store.insert_category(&b).await.unwrap();

        store.insert_product(&product("P1", "S-1", a.id)).await.unwrap();
        store.insert_product(&product("P2", "S-2", a.id)).await.unwrap();
        let mut inactive = product("P3", "S-3", b.id);
        inactive.active = false;
        store.insert_product(&inactive).await.unwrap();

        let counts = store.count_active_products_by_category().await.unwrap();
        assert_eq!(counts.get(&a.id), Some(&2));
        assert_eq!(counts.get(&b.id), None);
    }

    #[tokio::test]
    async fn update_breadcrumbs_touches_only_listed_categories() {
        let store = MemoryStore::new();
        let a = category("Plomería");
        let b = category("Baños");
        store.insert_category(&a).await.unwrap();
        store.insert_category(&b).await.unwrap();
        store.insert_product(&product("P1", "S-1", a.id)).await.unwrap();
        store.insert_product(&product("P2", "S-2", b.id)).await.unwrap();

        let touched = store
            .update_breadcrumbs(&[(a.id, "Plomería".to_string())])
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let products = store.list_products().await.unwrap();
        let p1 = products.iter().find(|p| p.sku == "S-1").unwrap();
        let p2 = products.iter().find(|p| p.sku == "S-2").unwrap();
        assert_eq!(p1.category_breadcrumb.as_deref(), Some("Plomería"));
        assert!(p2.category_breadcrumb.is_none());
    }
}
