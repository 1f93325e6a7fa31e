//! In-memory adjacency index over a category snapshot.
//!
//! The index is the reference for every structural question: descendant
//! expansion, cycle detection, depth checks, breadcrumbs, and count
//! rollups. It never mutates anything; services load a snapshot, consult
//! the index, and write the answers back through the store.
//!
//! All walks carry a visited set. A corrupted snapshot containing a cycle
//! must terminate the walk, not hang it.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::categories::Category;

/// Separator used in denormalized breadcrumb strings.
pub const BREADCRUMB_SEPARATOR: &str = " > ";

/// Direct and rolled-up active product counts for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    /// Active products attached directly to the node.
    pub direct: i64,
    /// `direct` plus the direct counts of every descendant.
    pub total: i64,
}

/// Immutable index over one snapshot of the category table.
#[derive(Debug, Clone)]
pub struct CategoryIndex {
    nodes: HashMap<Uuid, Category>,
    by_slug: HashMap<String, Uuid>,
    children: HashMap<Uuid, Vec<Uuid>>,
    roots: Vec<Uuid>,
}

impl CategoryIndex {
    /// Builds the index from a category snapshot.
    ///
    /// Child lists and roots are ordered by `(sort_order, slug)` so every
    /// traversal is deterministic. Nodes whose parent is missing from the
    /// snapshot are treated as unreachable rather than promoted to roots.
    #[must_use]
    pub fn new(categories: &[Category]) -> Self {
        let mut nodes: HashMap<Uuid, Category> = HashMap::with_capacity(categories.len());
        let mut by_slug: HashMap<String, Uuid> = HashMap::with_capacity(categories.len());
        for category in categories {
            by_slug.insert(category.slug.clone(), category.id);
            nodes.insert(category.id, category.clone());
        }

        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut roots: Vec<Uuid> = Vec::new();
        for category in nodes.values() {
            match category.parent_id {
                Some(parent_id) if nodes.contains_key(&parent_id) => {
                    children.entry(parent_id).or_default().push(category.id);
                }
                Some(_) => {}
                None => roots.push(category.id),
            }
        }

        let sort_key = |id: &Uuid| {
            let node = &nodes[id];
            (node.sort_order, node.slug.clone())
        };
        for list in children.values_mut() {
            list.sort_by_key(sort_key);
        }
        roots.sort_by_key(sort_key);

        CategoryIndex {
            nodes,
            by_slug,
            children,
            roots,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Category> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn get_by_slug(&self, slug: &str) -> Option<&Category> {
        self.by_slug.get(slug).and_then(|id| self.nodes.get(id))
    }

    #[must_use]
    pub fn slug_taken(&self, slug: &str) -> bool {
        self.by_slug.contains_key(slug)
    }

    /// Root ids in display order.
    #[must_use]
    pub fn root_ids(&self) -> &[Uuid] {
        &self.roots
    }

    /// Direct children of `id` in display order.
    #[must_use]
    pub fn child_ids(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// All categories, parents before children, in display order.
    #[must_use]
    pub fn in_tree_order(&self) -> Vec<&Category> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::new();
        let mut stack: Vec<Uuid> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                ordered.push(node);
            }
            for child in self.child_ids(id).iter().rev() {
                stack.push(*child);
            }
        }
        ordered
    }

    /// Ancestor ids from the node's parent up to its root. Stops early on
    /// a missing parent or a repeated id.
    #[must_use]
    pub fn ancestor_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut ancestors = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::from([id]);
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(ancestor_id) = current {
            if !seen.insert(ancestor_id) {
                break;
            }
            let Some(ancestor) = self.nodes.get(&ancestor_id) else {
                break;
            };
            ancestors.push(ancestor_id);
            current = ancestor.parent_id;
        }
        ancestors
    }

    /// Path from the root down to the node, both inclusive.
    #[must_use]
    pub fn path(&self, id: Uuid) -> Vec<&Category> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut path: Vec<&Category> = self
            .ancestor_ids(id)
            .into_iter()
            .filter_map(|ancestor_id| self.nodes.get(&ancestor_id))
            .collect();
        path.reverse();
        path.push(node);
        path
    }

    /// Denormalized `"Root > Child > Leaf"` string for the node.
    #[must_use]
    pub fn breadcrumb(&self, id: Uuid) -> Option<String> {
        let path = self.path(id);
        if path.is_empty() {
            return None;
        }
        Some(
            path.iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(BREADCRUMB_SEPARATOR),
        )
    }

    /// Every descendant of `id` (excluding `id` itself), breadth-first.
    #[must_use]
    pub fn descendant_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut descendants = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::from([id]);
        let mut queue: VecDeque<Uuid> = self.child_ids(id).iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            descendants.push(current);
            queue.extend(self.child_ids(current).iter().copied());
        }
        descendants
    }

    /// The node plus all its descendants, for category-scoped product
    /// queries.
    #[must_use]
    pub fn expand_with_descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut expanded = vec![id];
        expanded.extend(self.descendant_ids(id));
        expanded
    }

    /// `true` when attaching `id` under `proposed_parent` would create a
    /// cycle: the parent chain above `proposed_parent` reaches `id`, or
    /// repeats an id (a cycle already present in the snapshot).
    #[must_use]
    pub fn would_create_cycle(&self, id: Uuid, proposed_parent: Uuid) -> bool {
        if id == proposed_parent {
            return true;
        }
        let mut seen: HashSet<Uuid> = HashSet::from([proposed_parent]);
        let mut current = self
            .nodes
            .get(&proposed_parent)
            .and_then(|n| n.parent_id);
        while let Some(ancestor_id) = current {
            if ancestor_id == id {
                return true;
            }
            if !seen.insert(ancestor_id) {
                return true;
            }
            current = self.nodes.get(&ancestor_id).and_then(|n| n.parent_id);
        }
        false
    }

    /// Longest chain below the node: 0 for a leaf, 1 when it has children
    /// with no grandchildren, and so on.
    #[must_use]
    pub fn subtree_height(&self, id: Uuid) -> i16 {
        let mut height: i16 = 0;
        let mut visited: HashSet<Uuid> = HashSet::from([id]);
        let mut frontier: Vec<Uuid> = self
            .child_ids(id)
            .iter()
            .copied()
            .filter(|c| visited.insert(*c))
            .collect();
        while !frontier.is_empty() {
            height += 1;
            frontier = frontier
                .iter()
                .flat_map(|node| self.child_ids(*node).iter().copied())
                .filter(|c| visited.insert(*c))
                .collect();
        }
        height
    }

    /// Levels for the node and its whole subtree if the node sat at
    /// `base_level`, parents before children. Used to cascade level
    /// recomputation after a reparent.
    #[must_use]
    pub fn subtree_levels(&self, id: Uuid, base_level: i16) -> Vec<(Uuid, i16)> {
        let mut levels = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<(Uuid, i16)> = VecDeque::from([(id, base_level)]);
        while let Some((current, level)) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            levels.push((current, level));
            for child in self.child_ids(current) {
                queue.push_back((*child, level + 1));
            }
        }
        levels
    }

    /// Rolls `direct` active-product counts up the tree.
    ///
    /// Every node in the snapshot gets an entry; the total is the direct
    /// count plus the direct counts of the descendant closure, so the
    /// rollup stays correct even on snapshots with unreachable nodes.
    #[must_use]
    pub fn rollup(&self, direct: &HashMap<Uuid, i64>) -> HashMap<Uuid, CategoryCounts> {
        let mut counts = HashMap::with_capacity(self.nodes.len());
        for id in self.nodes.keys() {
            let own = direct.get(id).copied().unwrap_or(0);
            let below: i64 = self
                .descendant_ids(*id)
                .iter()
                .map(|d| direct.get(d).copied().unwrap_or(0))
                .sum();
            counts.insert(
                *id,
                CategoryCounts {
                    direct: own,
                    total: own + below,
                },
            );
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::categories::CategoryKind;

    fn category(name: &str, parent: Option<&Category>, sort_order: i32) -> Category {
        let level = parent.map_or(0, |p| p.level + 1);
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: crate::slug::slugify(name),
            description: None,
            parent_id: parent.map(|p| p.id),
            level,
            kind: CategoryKind::for_level(level),
            sort_order,
            active: true,
            product_count: 0,
            total_product_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// plomeria > tubos > pvc, plus plomeria > llaves and a second root.
    fn fixture() -> (Vec<Category>, Uuid, Uuid, Uuid, Uuid, Uuid) {
        let plomeria = category("Plomería", None, 0);
        let banos = category("Baños", None, 1);
        let tubos = category("Tubos", Some(&plomeria), 0);
        let llaves = category("Llaves", Some(&plomeria), 1);
        let pvc = category("PVC", Some(&tubos), 0);
        let ids = (plomeria.id, banos.id, tubos.id, llaves.id, pvc.id);
        (
            vec![plomeria, banos, tubos, llaves, pvc],
            ids.0,
            ids.1,
            ids.2,
            ids.3,
            ids.4,
        )
    }

    #[test]
    fn roots_and_children_are_in_display_order() {
        let (categories, plomeria, banos, tubos, llaves, _) = fixture();
        let index = CategoryIndex::new(&categories);
        assert_eq!(index.root_ids(), &[plomeria, banos]);
        assert_eq!(index.child_ids(plomeria), &[tubos, llaves]);
    }

    #[test]
    fn lookup_by_slug() {
        let (categories, plomeria, ..) = fixture();
        let index = CategoryIndex::new(&categories);
        assert_eq!(index.get_by_slug("plomeria").map(|c| c.id), Some(plomeria));
        assert!(index.get_by_slug("no-such").is_none());
        assert!(index.slug_taken("banos"));
    }

    #[test]
    fn descendants_exclude_self_and_cover_all_levels() {
        let (categories, plomeria, _, tubos, llaves, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        let descendants = index.descendant_ids(plomeria);
        assert_eq!(descendants.len(), 3);
        assert!(descendants.contains(&tubos));
        assert!(descendants.contains(&llaves));
        assert!(descendants.contains(&pvc));
        assert!(!descendants.contains(&plomeria));
    }

    #[test]
    fn expand_with_descendants_includes_self_first() {
        let (categories, _, _, tubos, _, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        let expanded = index.expand_with_descendants(tubos);
        assert_eq!(expanded[0], tubos);
        assert!(expanded.contains(&pvc));
        assert_eq!(expanded.len(), 2);
    }

    #[test]
    fn sibling_subtrees_do_not_leak_into_each_other() {
        let (categories, _, _, _, llaves, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        assert!(index.descendant_ids(llaves).is_empty());
        assert!(!index.expand_with_descendants(llaves).contains(&pvc));
    }

    #[test]
    fn ancestors_walk_to_the_root() {
        let (categories, plomeria, _, tubos, _, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        assert_eq!(index.ancestor_ids(pvc), vec![tubos, plomeria]);
        assert!(index.ancestor_ids(plomeria).is_empty());
    }

    #[test]
    fn breadcrumb_joins_names_root_first() {
        let (categories, _, _, _, _, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        assert_eq!(
            index.breadcrumb(pvc).as_deref(),
            Some("Plomería > Tubos > PVC")
        );
    }

    #[test]
    fn breadcrumb_of_unknown_id_is_none() {
        let (categories, ..) = fixture();
        let index = CategoryIndex::new(&categories);
        assert!(index.breadcrumb(Uuid::new_v4()).is_none());
    }

    #[test]
    fn cycle_detected_for_self_parent() {
        let (categories, plomeria, ..) = fixture();
        let index = CategoryIndex::new(&categories);
        assert!(index.would_create_cycle(plomeria, plomeria));
    }

    #[test]
    fn cycle_detected_when_moving_under_own_descendant() {
        let (categories, plomeria, _, tubos, _, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        assert!(index.would_create_cycle(plomeria, pvc));
        assert!(index.would_create_cycle(tubos, pvc));
    }

    #[test]
    fn no_cycle_when_moving_to_a_sibling_subtree() {
        let (categories, _, banos, tubos, llaves, _) = fixture();
        let index = CategoryIndex::new(&categories);
        assert!(!index.would_create_cycle(tubos, banos));
        assert!(!index.would_create_cycle(llaves, tubos));
    }

    #[test]
    fn corrupted_snapshot_with_cycle_terminates_walks() {
        let (mut categories, plomeria, banos, ..) = fixture();
        // Point the two roots at each other.
        for c in &mut categories {
            if c.id == plomeria {
                c.parent_id = Some(banos);
            } else if c.id == banos {
                c.parent_id = Some(plomeria);
            }
        }
        let index = CategoryIndex::new(&categories);
        let other = Uuid::new_v4();
        assert!(index.would_create_cycle(other, plomeria));
        // Walks terminate instead of hanging.
        let _ = index.ancestor_ids(plomeria);
        let _ = index.descendant_ids(plomeria);
        let _ = index.subtree_height(plomeria);
    }

    #[test]
    fn subtree_height_counts_levels_below() {
        let (categories, plomeria, banos, tubos, _, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        assert_eq!(index.subtree_height(plomeria), 2);
        assert_eq!(index.subtree_height(tubos), 1);
        assert_eq!(index.subtree_height(pvc), 0);
        assert_eq!(index.subtree_height(banos), 0);
    }

    #[test]
    fn subtree_levels_cascade_from_base() {
        let (categories, plomeria, _, tubos, llaves, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        let levels: HashMap<Uuid, i16> = index.subtree_levels(plomeria, 1).into_iter().collect();
        assert_eq!(levels[&plomeria], 1);
        assert_eq!(levels[&tubos], 2);
        assert_eq!(levels[&llaves], 2);
        assert_eq!(levels[&pvc], 3);
    }

    #[test]
    fn rollup_totals_include_descendants_only() {
        let (categories, plomeria, banos, tubos, llaves, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        let direct: HashMap<Uuid, i64> =
            [(tubos, 2), (pvc, 5), (llaves, 1), (banos, 4)].into_iter().collect();
        let counts = index.rollup(&direct);
        assert_eq!(counts[&pvc], CategoryCounts { direct: 5, total: 5 });
        assert_eq!(counts[&tubos], CategoryCounts { direct: 2, total: 7 });
        assert_eq!(
            counts[&plomeria],
            CategoryCounts { direct: 0, total: 8 }
        );
        assert_eq!(counts[&banos], CategoryCounts { direct: 4, total: 4 });
    }

    #[test]
    fn in_tree_order_lists_parents_before_children() {
        let (categories, plomeria, banos, tubos, _, pvc) = fixture();
        let index = CategoryIndex::new(&categories);
        let order: Vec<Uuid> = index.in_tree_order().iter().map(|c| c.id).collect();
        let pos = |id: Uuid| order.iter().position(|x| *x == id).unwrap();
        assert_eq!(order.len(), 5);
        assert!(pos(plomeria) < pos(tubos));
        assert!(pos(tubos) < pos(pvc));
        assert!(pos(plomeria) < pos(banos));
    }
}
