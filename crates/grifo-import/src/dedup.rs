//! Duplicate detection for import rows.
//!
//! A row is a duplicate when it collides with the store or with an earlier
//! row of the same feed on any of three keys, checked most-specific first:
//! a SKU (base or variant, case-insensitive), the (name, category, brand)
//! triple, or the bare name.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use grifo_core::products::{Product, ProductDraft};
use grifo_core::sku::normalize_sku;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    Sku,
    NameCategoryBrand,
    Name,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::Sku => write!(f, "sku match"),
            DuplicateReason::NameCategoryBrand => write!(f, "name/category/brand match"),
            DuplicateReason::Name => write!(f, "name match"),
        }
    }
}

/// What a row collided with. `existing_id` is `None` when the collision is
/// with an earlier row of the same feed rather than a stored product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateMatch {
    pub existing_id: Option<Uuid>,
    pub reason: DuplicateReason,
}

/// In-memory duplicate index over the catalog plus the rows seen so far in
/// the current run.
#[derive(Debug, Default)]
pub struct DedupIndex {
    by_sku: HashMap<String, Option<Uuid>>,
    by_name: HashMap<String, Option<Uuid>>,
    by_triple: HashMap<(String, Uuid, String), Option<Uuid>>,
}

impl DedupIndex {
    #[must_use]
    pub fn from_products(products: &[Product]) -> Self {
        let mut index = DedupIndex::default();
        for product in products {
            index.insert_product(product);
        }
        index
    }

    /// Classifies a draft against everything indexed so far. Returns the
    /// most specific match, or `None` when the draft is new.
    #[must_use]
    pub fn classify(&self, draft: &ProductDraft) -> Option<DuplicateMatch> {
        for sku in draft.all_skus() {
            let key = normalize_sku(sku);
            if key.is_empty() {
                continue;
            }
            if let Some(existing_id) = self.by_sku.get(&key) {
                return Some(DuplicateMatch {
                    existing_id: *existing_id,
                    reason: DuplicateReason::Sku,
                });
            }
        }

        let name = name_key(&draft.name);
        if name.is_empty() {
            return None;
        }
        if let Some(category_id) = draft.category_id {
            let triple = (name.clone(), category_id, brand_key(draft.brand.as_deref()));
            if let Some(existing_id) = self.by_triple.get(&triple) {
                return Some(DuplicateMatch {
                    existing_id: *existing_id,
                    reason: DuplicateReason::NameCategoryBrand,
                });
            }
        }
        self.by_name.get(&name).map(|existing_id| DuplicateMatch {
            existing_id: *existing_id,
            reason: DuplicateReason::Name,
        })
    }

    pub fn insert_product(&mut self, product: &Product) {
        let id = Some(product.id);
        for sku in product.all_skus() {
            self.insert_sku(sku, id);
        }
        self.insert_keys(&product.name, product.category_id, product.brand.as_deref(), id);
    }

    /// Indexes a draft accepted earlier in the same run, so later rows of
    /// the feed collide with it even before anything is written.
    pub fn insert_draft(&mut self, draft: &ProductDraft) {
        for sku in draft.all_skus() {
            self.insert_sku(sku, None);
        }
        if let Some(category_id) = draft.category_id {
            self.insert_keys(&draft.name, category_id, draft.brand.as_deref(), None);
        }
    }

    fn insert_sku(&mut self, sku: &str, id: Option<Uuid>) {
        let key = normalize_sku(sku);
        if !key.is_empty() {
            self.by_sku.entry(key).or_insert(id);
        }
    }

    fn insert_keys(
        &mut self,
        name: &str,
        category_id: Uuid,
        brand: Option<&str>,
        id: Option<Uuid>,
    ) {
        let name = name_key(name);
        if name.is_empty() {
            return;
        }
        self.by_triple
            .entry((name.clone(), category_id, brand_key(brand)))
            .or_insert(id);
        self.by_name.entry(name).or_insert(id);
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn brand_key(brand: Option<&str>) -> String {
    brand.map(str::trim).unwrap_or_default().to_lowercase()
}
