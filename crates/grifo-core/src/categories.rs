use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slug::slugify;

/// Deepest level a category may occupy. Roots are level 0, so the tree
/// holds at most four levels (0 through 3).
pub const MAX_CATEGORY_LEVEL: i16 = 3;

/// Whether a node is a tree root or lives under a parent. Kept as stored
/// data for feed consumers, but always derivable from `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Main,
    Sub,
}

impl CategoryKind {
    #[must_use]
    pub fn for_level(level: i16) -> Self {
        if level == 0 {
            CategoryKind::Main
        } else {
            CategoryKind::Sub
        }
    }
}

impl std::fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryKind::Main => write!(f, "main"),
            CategoryKind::Sub => write!(f, "sub"),
        }
    }
}

/// A node in the category tree.
///
/// `product_count` is the number of active products attached directly to
/// this node; `total_product_count` additionally includes every active
/// product under its descendants. Both are denormalized rollups, refreshed
/// by the recount pass rather than kept transactionally exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub level: i16,
    pub kind: CategoryKind,
    pub sort_order: i32,
    pub active: bool,
    pub product_count: i64,
    pub total_product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input for creating a category. Slug, level, and kind are derived, never
/// accepted from the caller.
#[derive(Debug, Clone, Default)]
pub struct CategoryDraft {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: Option<i32>,
}

/// Partial category update. Outer `None` leaves a field untouched; for
/// clearable fields the inner `Option` distinguishes "set to NULL"
/// (`Some(None)`) from "keep current" (`None`).
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<Uuid>>,
    pub sort_order: Option<i32>,
    pub active: Option<bool>,
}

impl CategoryUpdate {
    /// `true` when the update carries no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.parent_id.is_none()
            && self.sort_order.is_none()
            && self.active.is_none()
    }
}

/// One category in a portable export file.
///
/// The serde aliases accept the legacy two-collection export shape, where
/// subcategories referenced their parent under `category` and carried
/// `order`/`isActive` field names. Slug is optional on import and derived
/// from the name when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "parent", alias = "category")]
    pub parent_slug: Option<String>,
    #[serde(default, alias = "order")]
    pub sort_order: i32,
    #[serde(default = "default_active", alias = "isActive")]
    pub active: bool,
}

impl CategoryRecord {
    /// The slug this record resolves to: the explicit one re-slugged for
    /// hygiene, else the slug of the name.
    #[must_use]
    pub fn resolved_slug(&self) -> String {
        match self.slug.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => slugify(explicit),
            _ => slugify(&self.name),
        }
    }
}

fn default_active() -> bool {
    true
}
