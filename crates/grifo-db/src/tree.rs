//! Category tree service: hierarchy mutations, breadcrumb upkeep, and the
//! denormalized product-count rollup.
//!
//! Mutations run under a single async lock so concurrent admin calls and
//! import batches cannot interleave slug probing, cycle checks, and level
//! cascades against different snapshots of the tree.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use grifo_core::{
    slug::{slugify, uniquify},
    Category, CategoryDraft, CategoryIndex, CategoryKind, CategoryRecord, CategoryUpdate,
    MAX_CATEGORY_LEVEL,
};

use crate::cache::{CategoryCache, RecountFlag};
use crate::store::CatalogStore;
use crate::CatalogError;

/// Outcome of a category seed-file upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

pub struct CategoryTree {
    store: Arc<dyn CatalogStore>,
    cache: Arc<CategoryCache>,
    recount: RecountFlag,
    write_lock: Mutex<()>,
}

impl CategoryTree {
    #[must_use]
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: Arc<CategoryCache>,
        recount: RecountFlag,
    ) -> Self {
        Self {
            store,
            cache,
            recount,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads a fresh snapshot of the whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the category list cannot be read.
    pub async fn index(&self) -> Result<CategoryIndex, CatalogError> {
        let categories = self.store.list_categories().await?;
        Ok(CategoryIndex::new(&categories))
    }

    /// All categories in tree order, parents before children.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the category list cannot be read.
    pub async fn list(&self) -> Result<Vec<Category>, CatalogError> {
        let index = self.index().await?;
        Ok(index.in_tree_order().into_iter().cloned().collect())
    }

    /// # Errors
    ///
    /// Returns [`CatalogError::CategoryNotFound`] if no category has this id.
    pub async fn get(&self, id: Uuid) -> Result<Category, CatalogError> {
        self.store
            .get_category(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound(id))
    }

    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the category list cannot be read.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, CatalogError> {
        let index = self.index().await?;
        Ok(index.get_by_slug(slug).cloned())
    }

    /// Categories that can take new children: active and above the deepest
    /// level. Admin forms use this to fill the parent picker.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the category list cannot be read.
    pub async fn parent_candidates(&self) -> Result<Vec<Category>, CatalogError> {
        let index = self.index().await?;
        Ok(index
            .in_tree_order()
            .into_iter()
            .filter(|c| c.active && c.level < MAX_CATEGORY_LEVEL)
            .cloned()
            .collect())
    }

    /// Root-to-node path, for breadcrumb rendering in admin views.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CategoryNotFound`] if no category has this id.
    pub async fn path(&self, id: Uuid) -> Result<Vec<Category>, CatalogError> {
        let index = self.index().await?;
        if index.get(id).is_none() {
            return Err(CatalogError::CategoryNotFound(id));
        }
        Ok(index.path(id).into_iter().cloned().collect())
    }

    /// The category's breadcrumb string, read through the shared cache.
    ///
    /// The cache version is observed before the tree is loaded, so a
    /// mutation that lands in between keeps the snapshot out of the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the category list cannot be read.
    pub async fn breadcrumb(&self, id: Uuid) -> Result<Option<String>, CatalogError> {
        if self.cache.is_warm().await {
            return Ok(self.cache.breadcrumb(id).await);
        }
        let observed = self.cache.version();
        let index = self.index().await?;
        let breadcrumb = index.breadcrumb(id);
        self.cache.warm_if_current(observed, &index).await;
        Ok(breadcrumb)
    }

    /// Creates a category under `draft.parent_id` (a root when `None`).
    ///
    /// The slug is derived from the name and uniquified against every slug
    /// in the tree; a missing sort order appends the node after its
    /// siblings.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] for an empty name,
    /// [`CatalogError::CategoryNotFound`] for an unknown parent, and
    /// [`CatalogError::DepthExceeded`] when the parent already sits at the
    /// deepest allowed level.
    pub async fn create(&self, draft: CategoryDraft) -> Result<Category, CatalogError> {
        let _guard = self.write_lock.lock().await;
        let index = self.index().await?;

        let name = draft.name.trim();
        if name.is_empty() {
            return Err(CatalogError::Validation(vec!["name is required".to_string()]));
        }

        let level = match draft.parent_id {
            Some(parent_id) => {
                let parent = index
                    .get(parent_id)
                    .ok_or(CatalogError::CategoryNotFound(parent_id))?;
                if !parent.active {
                    return Err(CatalogError::Validation(vec![format!(
                        "parent '{}' is inactive",
                        parent.slug
                    )]));
                }
                parent.level + 1
            }
            None => 0,
        };
        if level > MAX_CATEGORY_LEVEL {
            return Err(CatalogError::DepthExceeded { attempted: level });
        }

        let base = slugify(name);
        if base.is_empty() {
            return Err(CatalogError::Validation(vec![format!(
                "name '{name}' produces an empty slug"
            )]));
        }
        let slug = uniquify(&base, |candidate| index.slug_taken(candidate));

        let sort_order = draft
            .sort_order
            .unwrap_or_else(|| next_sort_order(&index, draft.parent_id));

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug,
            description: draft.description,
            parent_id: draft.parent_id,
            level,
            kind: CategoryKind::for_level(level),
            sort_order,
            active: true,
            product_count: 0,
            total_product_count: 0,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert_category(&category)
            .await
            .map_err(CatalogError::from_write)?;
        self.cache.invalidate().await;
        Ok(category)
    }

    /// Applies a partial update; a rename re-derives the slug and a parent
    /// change cascades levels through the whole subtree.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Cycle`] when the new parent sits inside the
    /// category's own subtree, [`CatalogError::DepthExceeded`] when the
    /// move would push a descendant past the deepest allowed level, and
    /// [`CatalogError::CategoryNotFound`] for an unknown id or parent.
    #[allow(clippy::too_many_lines)] // Orchestration function: validation, reparent checks, cascades.
    pub async fn update(&self, id: Uuid, update: CategoryUpdate) -> Result<Category, CatalogError> {
        let _guard = self.write_lock.lock().await;
        let index = self.index().await?;
        let existing = index
            .get(id)
            .ok_or(CatalogError::CategoryNotFound(id))?
            .clone();
        if update.is_empty() {
            return Ok(existing);
        }

        let mut next = existing.clone();

        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CatalogError::Validation(vec!["name is required".to_string()]));
            }
            if name != existing.name {
                next.name = name.to_string();
                let base = slugify(name);
                if base.is_empty() {
                    return Err(CatalogError::Validation(vec![format!(
                        "name '{name}' produces an empty slug"
                    )]));
                }
                if base != existing.slug {
                    next.slug = uniquify(&base, |candidate| {
                        candidate != existing.slug && index.slug_taken(candidate)
                    });
                }
            }
        }

        if let Some(description) = &update.description {
            next.description = description.clone();
        }
        if let Some(sort_order) = update.sort_order {
            next.sort_order = sort_order;
        }
        if let Some(active) = update.active {
            next.active = active;
        }

        if let Some(new_parent) = update.parent_id {
            match new_parent {
                Some(parent_id) => {
                    let parent = index
                        .get(parent_id)
                        .ok_or(CatalogError::CategoryNotFound(parent_id))?;
                    if !parent.active {
                        return Err(CatalogError::Validation(vec![format!(
                            "parent '{}' is inactive",
                            parent.slug
                        )]));
                    }
                    if index.would_create_cycle(id, parent_id) {
                        return Err(CatalogError::Cycle {
                            slug: existing.slug.clone(),
                            parent_slug: parent.slug.clone(),
                        });
                    }
                    let new_level = parent.level + 1;
                    let deepest = new_level + index.subtree_height(id);
                    if deepest > MAX_CATEGORY_LEVEL {
                        return Err(CatalogError::DepthExceeded { attempted: deepest });
                    }
                    next.parent_id = Some(parent_id);
                    next.level = new_level;
                }
                None => {
                    next.parent_id = None;
                    next.level = 0;
                }
            }
            next.kind = CategoryKind::for_level(next.level);
        }

        let renamed = next.name != existing.name;
        let moved = next.parent_id != existing.parent_id;
        next.updated_at = Utc::now();

        self.store
            .update_category(&next)
            .await
            .map_err(CatalogError::from_write)?;

        if moved && next.level != existing.level {
            // Descendant levels shift by the same delta; the node itself was
            // written above.
            let cascade: Vec<(Uuid, i16)> = index
                .subtree_levels(id, next.level)
                .into_iter()
                .skip(1)
                .collect();
            if !cascade.is_empty() {
                self.store.update_category_levels(&cascade).await?;
            }
        }

        if renamed || moved {
            self.refresh_breadcrumbs(id).await?;
        }
        if moved {
            self.recount.mark();
        }

        self.cache.invalidate().await;
        Ok(next)
    }

    /// Marks the category inactive without touching its children or the
    /// products attached to it.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CategoryNotFound`] if no category has this id.
    pub async fn deactivate(&self, id: Uuid) -> Result<Category, CatalogError> {
        let _guard = self.write_lock.lock().await;
        let index = self.index().await?;
        let existing = index
            .get(id)
            .ok_or(CatalogError::CategoryNotFound(id))?
            .clone();
        if !existing.active {
            return Ok(existing);
        }

        let counts = self.store.count_active_products_by_category().await?;
        let attached: i64 = index
            .expand_with_descendants(id)
            .iter()
            .map(|c| counts.get(c).copied().unwrap_or(0))
            .sum();
        if attached > 0 {
            tracing::warn!(
                category = %existing.slug,
                products = attached,
                "deactivating category with active products still attached"
            );
        }

        let mut next = existing;
        next.active = false;
        next.updated_at = Utc::now();
        self.store
            .update_category(&next)
            .await
            .map_err(CatalogError::from_write)?;
        self.cache.invalidate().await;
        Ok(next)
    }

    /// Recomputes the denormalized product counts for every category and
    /// clears the recount flag.
    ///
    /// Direct counts cover active products only; totals roll the direct
    /// counts up through each category's descendant closure.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if counting or writing fails.
    pub async fn recount(&self) -> Result<usize, CatalogError> {
        let index = self.index().await?;
        let direct = self.store.count_active_products_by_category().await?;
        let rollup = index.rollup(&direct);
        let rows: Vec<(Uuid, i64, i64)> = rollup
            .into_iter()
            .map(|(id, counts)| (id, counts.direct, counts.total))
            .collect();
        self.store.write_category_counts(&rows).await?;
        self.recount.clear();
        Ok(rows.len())
    }

    #[must_use]
    pub fn recount_pending(&self) -> bool {
        self.recount.is_marked()
    }

    /// Upserts seed records, matching existing categories by slug.
    ///
    /// Records must come parents before children, the order
    /// [`grifo_core::seed_file::flatten_categories`] produces. The upsert
    /// never moves an existing category to a different parent; a record
    /// that disagrees with the stored parent is applied in place and the
    /// mismatch is logged.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] when a record names an unknown
    /// parent and [`CatalogError::DepthExceeded`] when a new node would sit
    /// below the deepest allowed level.
    pub async fn import_records(
        &self,
        records: &[CategoryRecord],
    ) -> Result<SeedOutcome, CatalogError> {
        let _guard = self.write_lock.lock().await;
        let index = self.index().await?;

        // Slug -> (id, level) view that grows as this run creates nodes, so
        // children can reference parents created a few records earlier.
        let mut known: std::collections::HashMap<String, (Uuid, i16)> = index
            .in_tree_order()
            .iter()
            .map(|c| (c.slug.clone(), (c.id, c.level)))
            .collect();

        let mut outcome = SeedOutcome::default();
        for record in records {
            let slug = record.resolved_slug();
            if slug.is_empty() {
                return Err(CatalogError::Validation(vec![format!(
                    "category '{}' produces an empty slug",
                    record.name
                )]));
            }

            let parent = match &record.parent_slug {
                Some(parent_slug) => Some(*known.get(parent_slug.as_str()).ok_or_else(|| {
                    CatalogError::Validation(vec![format!(
                        "category '{slug}' references unknown parent '{parent_slug}'"
                    )])
                })?),
                None => None,
            };

            if let Some(existing) = index.get_by_slug(&slug) {
                let mut next = existing.clone();
                if let Some((parent_id, _)) = parent {
                    if existing.parent_id != Some(parent_id) {
                        tracing::warn!(
                            category = %slug,
                            "seed record disagrees with stored parent; keeping the stored tree"
                        );
                    }
                } else if existing.parent_id.is_some() && record.parent_slug.is_none() {
                    tracing::warn!(
                        category = %slug,
                        "seed record disagrees with stored parent; keeping the stored tree"
                    );
                }
                next.name = record.name.clone();
                next.description = record.description.clone();
                next.sort_order = record.sort_order;
                next.active = record.active;
                if next.name == existing.name
                    && next.description == existing.description
                    && next.sort_order == existing.sort_order
                    && next.active == existing.active
                {
                    outcome.unchanged += 1;
                    continue;
                }
                next.updated_at = Utc::now();
                self.store
                    .update_category(&next)
                    .await
                    .map_err(CatalogError::from_write)?;
                outcome.updated += 1;
                continue;
            }

            let level = parent.map_or(0, |(_, parent_level)| parent_level + 1);
            if level > MAX_CATEGORY_LEVEL {
                return Err(CatalogError::DepthExceeded { attempted: level });
            }
            let now = Utc::now();
            let category = Category {
                id: Uuid::new_v4(),
                name: record.name.clone(),
                slug: slug.clone(),
                description: record.description.clone(),
                parent_id: parent.map(|(id, _)| id),
                level,
                kind: CategoryKind::for_level(level),
                sort_order: record.sort_order,
                active: record.active,
                product_count: 0,
                total_product_count: 0,
                created_at: now,
                updated_at: now,
            };
            self.store
                .insert_category(&category)
                .await
                .map_err(CatalogError::from_write)?;
            known.insert(slug, (category.id, level));
            outcome.created += 1;
        }

        self.cache.invalidate().await;
        Ok(outcome)
    }

    /// Snapshot of the tree as seed records, parents before children, for
    /// the export command.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if the category list cannot be read.
    pub async fn export_records(&self) -> Result<Vec<CategoryRecord>, CatalogError> {
        let index = self.index().await?;
        let records = index
            .in_tree_order()
            .into_iter()
            .map(|category| CategoryRecord {
                name: category.name.clone(),
                slug: Some(category.slug.clone()),
                description: category.description.clone(),
                parent_slug: category
                    .parent_id
                    .and_then(|pid| index.get(pid))
                    .map(|parent| parent.slug.clone()),
                sort_order: category.sort_order,
                active: category.active,
            })
            .collect();
        Ok(records)
    }

    /// Rewrites the cached breadcrumb column for the category and every
    /// descendant, from a snapshot taken after the mutation.
    async fn refresh_breadcrumbs(&self, id: Uuid) -> Result<(), CatalogError> {
        let index = self.index().await?;
        let per_category: Vec<(Uuid, String)> = index
            .expand_with_descendants(id)
            .into_iter()
            .filter_map(|cid| index.breadcrumb(cid).map(|b| (cid, b)))
            .collect();
        if !per_category.is_empty() {
            let touched = self.store.update_breadcrumbs(&per_category).await?;
            tracing::debug!(categories = per_category.len(), products = touched, "refreshed breadcrumbs");
        }
        Ok(())
    }
}

fn next_sort_order(index: &CategoryIndex, parent_id: Option<Uuid>) -> i32 {
    let siblings = match parent_id {
        Some(pid) => index.child_ids(pid),
        None => index.root_ids(),
    };
    siblings
        .iter()
        .filter_map(|id| index.get(*id))
        .map(|c| c.sort_order)
        .max()
        .map_or(0, |highest| highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn service() -> CategoryTree {
        CategoryTree::new(
            Arc::new(MemoryStore::new()),
            Arc::new(CategoryCache::new()),
            RecountFlag::new(),
        )
    }

    fn draft(name: &str, parent_id: Option<Uuid>) -> CategoryDraft {
        CategoryDraft {
            name: name.to_string(),
            description: None,
            parent_id,
            sort_order: None,
        }
    }

    #[tokio::test]
    async fn create_derives_slug_level_and_kind() {
        let tree = service();

        let root = tree.create(draft("Grifería", None)).await.unwrap();
        assert_eq!(root.slug, "griferia");
        assert_eq!(root.level, 0);
        assert_eq!(root.kind, CategoryKind::Main);
        assert!(root.active);

        let child = tree.create(draft("Monomandos", Some(root.id))).await.unwrap();
        assert_eq!(child.level, 1);
        assert_eq!(child.kind, CategoryKind::Sub);
        assert_eq!(child.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn create_uniquifies_colliding_slugs() {
        let tree = service();

        let first = tree.create(draft("Baños", None)).await.unwrap();
        let second = tree.create(draft("BAÑOS", None)).await.unwrap();

        assert_eq!(first.slug, "banos");
        assert_eq!(second.slug, "banos-1");
    }

    #[tokio::test]
    async fn create_appends_after_siblings() {
        let tree = service();
        let root = tree.create(draft("Plomería", None)).await.unwrap();

        let a = tree.create(draft("Tubos", Some(root.id))).await.unwrap();
        let b = tree.create(draft("Llaves", Some(root.id))).await.unwrap();

        assert_eq!(a.sort_order, 0);
        assert_eq!(b.sort_order, 1);
    }

    #[tokio::test]
    async fn create_rejects_depth_past_the_limit() {
        let tree = service();
        let mut parent_id = None;
        for name in ["A", "B", "C", "D"] {
            let node = tree.create(draft(name, parent_id)).await.unwrap();
            parent_id = Some(node.id);
        }

        let result = tree.create(draft("E", parent_id)).await;
        assert!(
            matches!(result, Err(CatalogError::DepthExceeded { attempted: 4 })),
            "expected depth error, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn create_rejects_unknown_parent() {
        let tree = service();
        let ghost = Uuid::new_v4();

        let result = tree.create(draft("Duchas", Some(ghost))).await;
        assert!(
            matches!(result, Err(CatalogError::CategoryNotFound(id)) if id == ghost),
            "expected not-found, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn rename_reslugs_and_rewrites_breadcrumbs() {
        let tree = service();
        let root = tree.create(draft("Plomería", None)).await.unwrap();
        let child = tree.create(draft("Tubos", Some(root.id))).await.unwrap();

        let updated = tree
            .update(
                root.id,
                CategoryUpdate {
                    name: Some("Plomería y Gas".to_string()),
                    ..CategoryUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.slug, "plomeria-y-gas");
        let crumb = tree.breadcrumb(child.id).await.unwrap();
        assert_eq!(crumb.as_deref(), Some("Plomería y Gas > Tubos"));
    }

    #[tokio::test]
    async fn rename_to_same_slug_keeps_the_slug() {
        let tree = service();
        let root = tree.create(draft("Baños", None)).await.unwrap();

        let updated = tree
            .update(
                root.id,
                CategoryUpdate {
                    name: Some("BAÑOS".to_string()),
                    ..CategoryUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "BAÑOS");
        assert_eq!(updated.slug, "banos");
    }

    #[tokio::test]
    async fn reparent_cascades_levels_and_marks_recount() {
        let tree = service();
        let plomeria = tree.create(draft("Plomería", None)).await.unwrap();
        let banos = tree.create(draft("Baños", None)).await.unwrap();
        let tubos = tree.create(draft("Tubos", Some(plomeria.id))).await.unwrap();
        let pvc = tree.create(draft("PVC", Some(tubos.id))).await.unwrap();

        let moved = tree
            .update(
                tubos.id,
                CategoryUpdate {
                    parent_id: Some(Some(banos.id)),
                    ..CategoryUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(banos.id));
        assert_eq!(moved.level, 1);

        let leaf = tree.get(pvc.id).await.unwrap();
        assert_eq!(leaf.level, 2);
        assert!(tree.recount_pending());

        let crumb = tree.breadcrumb(pvc.id).await.unwrap();
        assert_eq!(crumb.as_deref(), Some("Baños > Tubos > PVC"));
    }

    #[tokio::test]
    async fn reparent_under_own_descendant_is_a_cycle() {
        let tree = service();
        let root = tree.create(draft("Plomería", None)).await.unwrap();
        let child = tree.create(draft("Tubos", Some(root.id))).await.unwrap();

        let result = tree
            .update(
                root.id,
                CategoryUpdate {
                    parent_id: Some(Some(child.id)),
                    ..CategoryUpdate::default()
                },
            )
            .await;
        assert!(
            matches!(
                &result,
                Err(CatalogError::Cycle { slug, parent_slug })
                    if slug == "plomeria" && parent_slug == "tubos"
            ),
            "expected cycle error, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn reparent_rejects_moves_that_push_descendants_too_deep() {
        let tree = service();
        let a = tree.create(draft("A", None)).await.unwrap();
        let b = tree.create(draft("B", Some(a.id))).await.unwrap();
        let _c = tree.create(draft("C", Some(b.id))).await.unwrap();
        let other = tree.create(draft("Other", None)).await.unwrap();
        let deep = tree.create(draft("Deep", Some(other.id))).await.unwrap();

        // Moving A (height 2) under `deep` (level 1) would put C at level 4.
        let result = tree
            .update(
                a.id,
                CategoryUpdate {
                    parent_id: Some(Some(deep.id)),
                    ..CategoryUpdate::default()
                },
            )
            .await;
        assert!(
            matches!(result, Err(CatalogError::DepthExceeded { attempted: 4 })),
            "expected depth error, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn empty_update_is_a_no_op() {
        let tree = service();
        let root = tree.create(draft("Baños", None)).await.unwrap();

        let unchanged = tree.update(root.id, CategoryUpdate::default()).await.unwrap();
        assert_eq!(unchanged.updated_at, root.updated_at);
    }

    #[tokio::test]
    async fn deactivate_leaves_children_active() {
        let tree = service();
        let root = tree.create(draft("Plomería", None)).await.unwrap();
        let child = tree.create(draft("Tubos", Some(root.id))).await.unwrap();

        let off = tree.deactivate(root.id).await.unwrap();
        assert!(!off.active);

        let still_on = tree.get(child.id).await.unwrap();
        assert!(still_on.active);
    }

    #[tokio::test]
    async fn create_rejects_inactive_parents() {
        let tree = service();
        let root = tree.create(draft("Plomería", None)).await.unwrap();
        tree.deactivate(root.id).await.unwrap();

        let result = tree.create(draft("Tubos", Some(root.id))).await;
        assert!(
            matches!(&result, Err(CatalogError::Validation(messages))
                if messages[0] == "parent 'plomeria' is inactive"),
            "expected inactive-parent rejection, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn parent_candidates_excludes_inactive_and_deepest_nodes() {
        let tree = service();
        let mut parent_id = None;
        for name in ["A", "B", "C", "D"] {
            let node = tree.create(draft(name, parent_id)).await.unwrap();
            parent_id = Some(node.id);
        }
        let retired = tree.create(draft("Viejo", None)).await.unwrap();
        tree.deactivate(retired.id).await.unwrap();

        let candidates = tree.parent_candidates().await.unwrap();
        let slugs: Vec<&str> = candidates.iter().map(|c| c.slug.as_str()).collect();

        // D sits at level 3 and cannot take children; Viejo is inactive.
        assert_eq!(slugs, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn import_records_upserts_by_slug() {
        let tree = service();
        let records = vec![
            CategoryRecord {
                name: "Plomería".to_string(),
                slug: None,
                description: None,
                parent_slug: None,
                sort_order: 0,
                active: true,
            },
            CategoryRecord {
                name: "Tubos".to_string(),
                slug: None,
                description: Some("Tubería y accesorios".to_string()),
                parent_slug: Some("plomeria".to_string()),
                sort_order: 0,
                active: true,
            },
        ];

        let first = tree.import_records(&records).await.unwrap();
        assert_eq!(
            first,
            SeedOutcome {
                created: 2,
                updated: 0,
                unchanged: 0
            }
        );

        // Re-running the same file only touches what changed.
        let mut evolved = records.clone();
        evolved[1].description = Some("Tubería, codos y accesorios".to_string());
        let second = tree.import_records(&evolved).await.unwrap();
        assert_eq!(
            second,
            SeedOutcome {
                created: 0,
                updated: 1,
                unchanged: 1
            }
        );

        let tubos = tree.get_by_slug("tubos").await.unwrap().unwrap();
        assert_eq!(
            tubos.description.as_deref(),
            Some("Tubería, codos y accesorios")
        );
        assert_eq!(tubos.level, 1);
    }

    #[tokio::test]
    async fn import_records_rejects_unknown_parents() {
        let tree = service();
        let records = vec![CategoryRecord {
            name: "Tubos".to_string(),
            slug: None,
            description: None,
            parent_slug: Some("plomeria".to_string()),
            sort_order: 0,
            active: true,
        }];

        let result = tree.import_records(&records).await;
        assert!(
            matches!(&result, Err(CatalogError::Validation(messages))
                if messages[0].contains("unknown parent 'plomeria'")),
            "expected validation error, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn export_round_trips_the_tree_shape() {
        let tree = service();
        let root = tree.create(draft("Plomería", None)).await.unwrap();
        tree.create(draft("Tubos", Some(root.id))).await.unwrap();

        let records = tree.export_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].slug.as_deref(), Some("plomeria"));
        assert_eq!(records[1].parent_slug.as_deref(), Some("plomeria"));
    }
}
