//! Dynamic bounding volume hierarchy
//!
//! Incrementally maintained binary AABB tree used as the collision broad
//! phase. Each leaf stores a payload key and an AABB fattened by a margin,
//! so small movements do not touch the tree at all. Internal nodes always
//! have exactly two children and bound both of them.
//!
//! Insertion picks the sibling with a surface area heuristic descent and
//! every ancestor of a changed node is refit and rebalanced with AVL-style
//! rotations on the way back to the root.

use crate::foundation::collections::{new_key_type, SlotMap};
use crate::foundation::logging::{debug, trace};
use crate::physics::collision::Ray;
use super::aabb::AABB;

new_key_type! {
    struct NodeKey;
}

/// Stable handle to a leaf of a [`Bvh`]
///
/// A leaf keeps its handle across [`Bvh::update`] restructures. Handles of
/// removed leaves go stale and every operation treats them as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeafId(NodeKey);

#[derive(Debug, Clone, Copy)]
enum NodeKind<K> {
    Leaf(K),
    Internal([NodeKey; 2]),
}

#[derive(Debug, Clone)]
struct Node<K> {
    aabb: AABB,
    parent: Option<NodeKey>,
    /// Leaves are height 0
    height: u32,
    kind: NodeKind<K>,
}

impl<K> Node<K> {
    fn children(&self) -> Option<[NodeKey; 2]> {
        match self.kind {
            NodeKind::Internal(children) => Some(children),
            NodeKind::Leaf(_) => None,
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }
}

/// Dynamic AABB tree keyed by payload `K`
#[derive(Debug, Clone)]
pub struct Bvh<K> {
    nodes: SlotMap<NodeKey, Node<K>>,
    root: Option<NodeKey>,
    leaf_count: usize,
    fat_margin: f32,
}

impl<K: Copy> Default for Bvh<K> {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl<K: Copy> Bvh<K> {
    /// Create an empty tree that fattens leaf bounds by `fat_margin`
    pub fn new(fat_margin: f32) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            leaf_count: 0,
            fat_margin: fat_margin.max(0.0),
        }
    }

    /// Margin added around every leaf's tight bounds
    pub fn fat_margin(&self) -> f32 {
        self.fat_margin
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    /// True when the tree holds no leaves
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Total number of nodes, leaves included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Height of the root (0 for a single leaf or an empty tree)
    pub fn height(&self) -> u32 {
        self.root.map_or(0, |root| self.nodes[root].height)
    }

    /// Bounds of the whole tree
    pub fn root_aabb(&self) -> Option<AABB> {
        self.root.map(|root| self.nodes[root].aabb)
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.leaf_count = 0;
    }

    /// Payload of a leaf
    pub fn key(&self, leaf: LeafId) -> Option<K> {
        match self.nodes.get(leaf.0)?.kind {
            NodeKind::Leaf(key) => Some(key),
            NodeKind::Internal(_) => None,
        }
    }

    /// Stored (fattened) bounds of a leaf
    pub fn fat_aabb(&self, leaf: LeafId) -> Option<AABB> {
        self.nodes
            .get(leaf.0)
            .filter(|node| node.is_leaf())
            .map(|node| node.aabb)
    }

    /// True if `leaf` refers to a live leaf
    pub fn contains(&self, leaf: LeafId) -> bool {
        self.fat_aabb(leaf).is_some()
    }

    /// Insert a payload with its tight bounds
    pub fn insert(&mut self, key: K, aabb: AABB) -> LeafId {
        let leaf = self.nodes.insert(Node {
            aabb: aabb.expanded(self.fat_margin),
            parent: None,
            height: 0,
            kind: NodeKind::Leaf(key),
        });
        self.insert_leaf(leaf);
        self.leaf_count += 1;
        LeafId(leaf)
    }

    /// Remove a leaf, returning its payload
    ///
    /// A stale handle is a no-op and returns `None`.
    pub fn remove(&mut self, leaf: LeafId) -> Option<K> {
        if !self.contains(leaf) {
            trace!("Ignoring removal of stale BVH leaf {:?}", leaf);
            return None;
        }
        self.remove_leaf(leaf.0);
        self.leaf_count -= 1;
        match self.nodes.remove(leaf.0)?.kind {
            NodeKind::Leaf(key) => Some(key),
            NodeKind::Internal(_) => None,
        }
    }

    /// Move a leaf to new tight bounds
    ///
    /// If the stored fat bounds still contain `aabb` nothing changes and
    /// `false` is returned. Otherwise the leaf is reinserted with freshly
    /// fattened bounds (keeping its [`LeafId`]) and `true` is returned.
    /// Stale handles return `false`.
    pub fn update(&mut self, leaf: LeafId, aabb: AABB) -> bool {
        let Some(fat) = self.fat_aabb(leaf) else {
            trace!("Ignoring update of stale BVH leaf {:?}", leaf);
            return false;
        };
        if fat.contains_aabb(&aabb) {
            return false;
        }

        self.remove_leaf(leaf.0);
        self.nodes[leaf.0].aabb = aabb.expanded(self.fat_margin);
        self.insert_leaf(leaf.0);
        debug!("Reinserted BVH leaf {:?}, tree height {}", leaf, self.height());
        true
    }

    /// Visit every leaf whose fat bounds overlap `aabb`
    pub fn query_aabb(&self, aabb: &AABB, mut visit: impl FnMut(LeafId, K)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(key) => visit(LeafId(index), key),
                NodeKind::Internal([left, right]) => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// Visit every leaf whose fat bounds the ray crosses
    ///
    /// Traversal stops early once `visit` returns `false`.
    pub fn query_ray(&self, ray: &Ray, mut visit: impl FnMut(LeafId, K) -> bool) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.aabb.intersect_ray(ray).is_none() {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(key) => {
                    if !visit(LeafId(index), key) {
                        return;
                    }
                }
                NodeKind::Internal([left, right]) => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// Visit every unordered pair of distinct leaves whose fat bounds overlap
    ///
    /// Each pair is reported exactly once. Pairs are found by testing the two
    /// subtrees of every internal node against each other.
    pub fn query_all_pairs(&self, mut visit: impl FnMut(K, K)) {
        let Some(root) = self.root else {
            return;
        };

        let mut pending: Vec<(NodeKey, NodeKey)> = Vec::new();
        let mut walk = vec![root];
        while let Some(index) = walk.pop() {
            if let Some([left, right]) = self.nodes[index].children() {
                pending.push((left, right));
                walk.push(left);
                walk.push(right);
            }
        }

        while let Some((a, b)) = pending.pop() {
            let node_a = &self.nodes[a];
            let node_b = &self.nodes[b];
            if !node_a.aabb.overlaps(&node_b.aabb) {
                continue;
            }
            match (node_a.kind, node_b.kind) {
                (NodeKind::Leaf(key_a), NodeKind::Leaf(key_b)) => visit(key_a, key_b),
                (NodeKind::Leaf(_), NodeKind::Internal([b1, b2])) => {
                    pending.push((a, b1));
                    pending.push((a, b2));
                }
                (NodeKind::Internal([a1, a2]), NodeKind::Leaf(_)) => {
                    pending.push((a1, b));
                    pending.push((a2, b));
                }
                (NodeKind::Internal([a1, a2]), NodeKind::Internal([b1, b2])) => {
                    // Descend the larger volume first
                    if node_a.aabb.surface_area() >= node_b.aabb.surface_area() {
                        pending.push((a1, b));
                        pending.push((a2, b));
                    } else {
                        pending.push((a, b1));
                        pending.push((a, b2));
                    }
                }
            }
        }
    }

    /// Visit every live leaf
    pub fn leaves(&self) -> impl Iterator<Item = (LeafId, K)> + '_ {
        self.nodes.iter().filter_map(|(index, node)| match node.kind {
            NodeKind::Leaf(key) => Some((LeafId(index), key)),
            NodeKind::Internal(_) => None,
        })
    }

    /// Visit every node with its depth (root is 0) and whether it is a leaf
    pub fn visit_nodes(&self, mut visit: impl FnMut(&AABB, usize, bool)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![(root, 0)];
        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index];
            visit(&node.aabb, depth, node.is_leaf());
            if let Some([left, right]) = node.children() {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
    }

    /// Sum of internal node areas relative to the root area
    ///
    /// Lower is better; a quality metric for tree construction.
    pub fn area_ratio(&self) -> f32 {
        let Some(root) = self.root else {
            return 0.0;
        };
        let root_area = self.nodes[root].aabb.surface_area();
        if root_area <= 0.0 {
            return 0.0;
        }
        let total: f32 = self
            .nodes
            .values()
            .filter(|node| !node.is_leaf())
            .map(|node| node.aabb.surface_area())
            .sum();
        total / root_area
    }

    /// Check every structural invariant of the tree
    ///
    /// Parent and child links agree, each internal node has two children
    /// and contains both of their bounds, heights are consistent, every node
    /// is reachable from the root, and a tree of `n` leaves has `2n - 1`
    /// nodes.
    pub fn validate(&self) -> bool {
        let Some(root) = self.root else {
            return self.nodes.is_empty() && self.leaf_count == 0;
        };
        if self.nodes.get(root).map_or(true, |node| node.parent.is_some()) {
            return false;
        }

        let mut visited = 0;
        let mut leaves = 0;
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            visited += 1;
            if visited > self.nodes.len() {
                return false;
            }
            let Some(node) = self.nodes.get(index) else {
                return false;
            };
            if !node.aabb.is_valid() {
                return false;
            }
            match node.kind {
                NodeKind::Leaf(_) => {
                    leaves += 1;
                    if node.height != 0 {
                        return false;
                    }
                }
                NodeKind::Internal(children) => {
                    let mut max_height = 0;
                    for child in children {
                        let Some(child_node) = self.nodes.get(child) else {
                            return false;
                        };
                        if child_node.parent != Some(index) || !node.aabb.contains_aabb(&child_node.aabb) {
                            return false;
                        }
                        max_height = max_height.max(child_node.height);
                        stack.push(child);
                    }
                    if children[0] == children[1] || node.height != max_height + 1 {
                        return false;
                    }
                }
            }
        }

        visited == self.nodes.len()
            && leaves == self.leaf_count
            && self.nodes.len() + 1 == 2 * self.leaf_count
    }

    /// Link an existing, detached leaf node into the tree
    fn insert_leaf(&mut self, leaf: NodeKey) {
        let Some(root) = self.root else {
            self.nodes[leaf].parent = None;
            self.root = Some(leaf);
            return;
        };

        let leaf_aabb = self.nodes[leaf].aabb;
        let sibling = self.find_best_sibling(root, &leaf_aabb);

        let old_parent = self.nodes[sibling].parent;
        let aabb = leaf_aabb.union(&self.nodes[sibling].aabb);
        let height = self.nodes[sibling].height + 1;
        let new_parent = self.nodes.insert(Node {
            aabb,
            parent: old_parent,
            height,
            kind: NodeKind::Internal([sibling, leaf]),
        });

        match old_parent {
            Some(parent) => self.replace_child(parent, sibling, new_parent),
            None => self.root = Some(new_parent),
        }
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        self.refit_from(Some(new_parent));
    }

    /// Surface area heuristic descent
    ///
    /// At each internal node, compare the cost of making the new leaf a
    /// sibling of the node itself against pushing it into either child.
    fn find_best_sibling(&self, root: NodeKey, leaf_aabb: &AABB) -> NodeKey {
        let mut index = root;
        while let Some([left, right]) = self.nodes[index].children() {
            let node_aabb = self.nodes[index].aabb;
            let area = node_aabb.surface_area();
            let combined_area = node_aabb.union(leaf_aabb).surface_area();

            // Cost of creating a new parent for this node and the leaf
            let cost = 2.0 * combined_area;
            // Minimum cost of pushing the leaf further down the tree
            let inheritance_cost = 2.0 * (combined_area - area);

            let child_cost = |child: NodeKey| {
                let child_node = &self.nodes[child];
                let union_area = child_node.aabb.union(leaf_aabb).surface_area();
                if child_node.is_leaf() {
                    union_area + inheritance_cost
                } else {
                    union_area - child_node.aabb.surface_area() + inheritance_cost
                }
            };
            let cost_left = child_cost(left);
            let cost_right = child_cost(right);

            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }
        index
    }

    /// Unlink a leaf from the tree without freeing it
    fn remove_leaf(&mut self, leaf: NodeKey) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }
        let Some(parent) = self.nodes[leaf].parent else {
            return;
        };
        let grand_parent = self.nodes[parent].parent;
        let sibling = match self.nodes[parent].children() {
            Some([left, right]) => {
                if left == leaf {
                    right
                } else {
                    left
                }
            }
            None => return,
        };

        self.nodes.remove(parent);
        self.nodes[leaf].parent = None;
        self.nodes[sibling].parent = grand_parent;
        match grand_parent {
            Some(grand_parent) => {
                self.replace_child(grand_parent, parent, sibling);
                self.refit_from(Some(grand_parent));
            }
            None => self.root = Some(sibling),
        }
    }

    fn replace_child(&mut self, parent: NodeKey, old: NodeKey, new: NodeKey) {
        if let NodeKind::Internal(children) = &mut self.nodes[parent].kind {
            for child in children.iter_mut() {
                if *child == old {
                    *child = new;
                }
            }
        }
    }

    /// Walk to the root, rebalancing and recomputing bounds and heights
    fn refit_from(&mut self, start: Option<NodeKey>) {
        let mut current = start;
        while let Some(index) = current {
            let index = self.balance(index);
            if let Some([left, right]) = self.nodes[index].children() {
                let aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);
                let height = 1 + self.nodes[left].height.max(self.nodes[right].height);
                let node = &mut self.nodes[index];
                node.aabb = aabb;
                node.height = height;
            }
            current = self.nodes[index].parent;
        }
    }

    /// Rotate the taller child of `index` up if the subtree is unbalanced
    ///
    /// Returns the node now at the position `index` used to occupy.
    fn balance(&mut self, index: NodeKey) -> NodeKey {
        let node = &self.nodes[index];
        let Some([left, right]) = node.children() else {
            return index;
        };
        if node.height < 2 {
            return index;
        }
        let left_height = i64::from(self.nodes[left].height);
        let right_height = i64::from(self.nodes[right].height);
        let balance = right_height - left_height;
        if balance > 1 {
            self.rotate_up(index, 1)
        } else if balance < -1 {
            self.rotate_up(index, 0)
        } else {
            index
        }
    }

    /// Promote child `slot` of `a` to take `a`'s place
    ///
    /// The promoted node keeps its taller child and hands the shorter one
    /// to `a`, which becomes the promoted node's first child.
    fn rotate_up(&mut self, a: NodeKey, slot: usize) -> NodeKey {
        let Some(a_children) = self.nodes[a].children() else {
            return a;
        };
        let up = a_children[slot];
        let other = a_children[1 - slot];
        let Some([f, g]) = self.nodes[up].children() else {
            return a;
        };

        let a_parent = self.nodes[a].parent;
        self.nodes[up].parent = a_parent;
        self.nodes[a].parent = Some(up);
        match a_parent {
            Some(parent) => self.replace_child(parent, a, up),
            None => self.root = Some(up),
        }

        let (taller, shorter) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };

        let mut new_a_children = a_children;
        new_a_children[slot] = shorter;
        self.nodes[a].kind = NodeKind::Internal(new_a_children);
        self.nodes[shorter].parent = Some(a);
        self.nodes[up].kind = NodeKind::Internal([a, taller]);

        let a_aabb = self.nodes[other].aabb.union(&self.nodes[shorter].aabb);
        let a_height = 1 + self.nodes[other].height.max(self.nodes[shorter].height);
        self.nodes[a].aabb = a_aabb;
        self.nodes[a].height = a_height;

        let up_aabb = a_aabb.union(&self.nodes[taller].aabb);
        let up_height = 1 + a_height.max(self.nodes[taller].height);
        self.nodes[up].aabb = up_aabb;
        self.nodes[up].height = up_height;

        trace!("BVH rotation: promoted subtree of height {}", up_height);
        up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use std::collections::HashSet;

    /// Small deterministic generator so failures are reproducible
    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self) -> f32 {
            self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            ((self.0 >> 40) as f32) / ((1u64 << 24) as f32)
        }

        fn range(&mut self, min: f32, max: f32) -> f32 {
            min + (max - min) * self.next_f32()
        }

        fn aabb(&mut self, extent: f32) -> AABB {
            let center = Vec3::new(self.range(-extent, extent), self.range(-extent, extent), self.range(-extent, extent));
            let half = Vec3::new(self.range(0.1, 1.5), self.range(0.1, 1.5), self.range(0.1, 1.5));
            AABB::from_center_half_extents(center, half)
        }
    }

    fn unit_box(x: f32) -> AABB {
        AABB::from_center_half_extents(Vec3::new(x, 0.0, 0.0), Vec3::repeat(0.5))
    }

    fn sorted_pair(a: u32, b: u32) -> (u32, u32) {
        (a.min(b), a.max(b))
    }

    #[test]
    fn test_empty_tree() {
        let bvh: Bvh<u32> = Bvh::new(0.1);
        assert!(bvh.is_empty());
        assert!(bvh.validate());
        assert_eq!(bvh.height(), 0);
        assert!(bvh.root_aabb().is_none());

        let mut visited = 0;
        bvh.query_all_pairs(|_, _| visited += 1);
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_insert_fattens_leaf() {
        let mut bvh = Bvh::new(0.25);
        let leaf = bvh.insert(1u32, unit_box(0.0));
        let fat = bvh.fat_aabb(leaf).unwrap();

        assert_eq!(fat, unit_box(0.0).expanded(0.25));
        assert_eq!(bvh.key(leaf), Some(1));
        assert_eq!(bvh.node_count(), 1);
        assert!(bvh.validate());
    }

    #[test]
    fn test_node_count_tracks_leaf_count() {
        let mut rng = Lcg(7);
        let mut bvh = Bvh::new(0.1);
        let mut leaves = Vec::new();

        for i in 0..200u32 {
            leaves.push(bvh.insert(i, rng.aabb(50.0)));
            assert_eq!(bvh.node_count(), 2 * bvh.len() - 1);
        }
        assert!(bvh.validate());

        // Remove every third leaf, then the rest
        let mut remaining = Vec::new();
        for (i, leaf) in leaves.into_iter().enumerate() {
            if i % 3 == 0 {
                assert!(bvh.remove(leaf).is_some());
                assert_eq!(bvh.node_count(), 2 * bvh.len() - 1);
            } else {
                remaining.push(leaf);
            }
        }
        assert!(bvh.validate());

        for leaf in remaining {
            bvh.remove(leaf);
        }
        assert!(bvh.is_empty());
        assert_eq!(bvh.node_count(), 0);
        assert!(bvh.validate());
    }

    #[test]
    fn test_random_operations_keep_tree_valid() {
        let mut rng = Lcg(1234);
        let mut bvh = Bvh::new(0.1);
        let mut live: Vec<(LeafId, u32)> = Vec::new();
        let mut next_key = 0u32;

        for step in 0..1000 {
            let roll = rng.next_f32();
            if roll < 0.45 || live.is_empty() {
                live.push((bvh.insert(next_key, rng.aabb(30.0)), next_key));
                next_key += 1;
            } else if roll < 0.7 {
                let index = (rng.next_f32() * live.len() as f32) as usize % live.len();
                let (leaf, key) = live.swap_remove(index);
                assert_eq!(bvh.remove(leaf), Some(key));
            } else {
                let index = (rng.next_f32() * live.len() as f32) as usize % live.len();
                let (leaf, key) = live[index];
                bvh.update(leaf, rng.aabb(30.0));
                assert_eq!(bvh.key(leaf), Some(key));
            }
            assert!(bvh.validate(), "tree invalid after step {step}");
            assert_eq!(bvh.len(), live.len());
        }
    }

    fn pairs_of(bvh: &Bvh<u32>) -> HashSet<(u32, u32)> {
        let mut pairs = HashSet::new();
        bvh.query_all_pairs(|a, b| {
            pairs.insert(sorted_pair(a, b));
        });
        pairs
    }

    fn hits_of(bvh: &Bvh<u32>, query: &AABB) -> HashSet<u32> {
        let mut hits = HashSet::new();
        bvh.query_aabb(query, |_, key| {
            hits.insert(key);
        });
        hits
    }

    #[test]
    fn test_insert_remove_order_does_not_change_answers() {
        let mut rng = Lcg(99);

        for _ in 0..50 {
            let background: Vec<AABB> = (0..12).map(|_| rng.aabb(6.0)).collect();
            let (a, b, c) = (rng.aabb(6.0), rng.aabb(6.0), rng.aabb(6.0));
            let queries: Vec<AABB> = (0..8).map(|_| rng.aabb(6.0)).collect();

            let mut first = Bvh::new(0.1);
            let mut second = Bvh::new(0.1);
            for (i, aabb) in background.iter().enumerate() {
                first.insert(i as u32, *aabb);
                second.insert(i as u32, *aabb);
            }

            // A, B, C then drop B
            first.insert(100, a);
            let leaf_b = first.insert(101, b);
            first.insert(102, c);
            assert_eq!(first.remove(leaf_b), Some(101));

            // A, C, then B, then drop B
            second.insert(100, a);
            second.insert(102, c);
            let leaf_b = second.insert(101, b);
            assert_eq!(second.remove(leaf_b), Some(101));

            for bvh in [&first, &second] {
                assert!(bvh.validate());
                assert_eq!(bvh.len(), 14);
                assert_eq!(bvh.node_count(), 2 * bvh.len() - 1);
            }
            assert_eq!(pairs_of(&first), pairs_of(&second));
            for query in &queries {
                assert_eq!(hits_of(&first, query), hits_of(&second, query));
            }
        }
    }

    #[test]
    fn test_update_within_fat_bounds_is_noop() {
        let mut bvh = Bvh::new(0.5);
        let leaf = bvh.insert(0u32, unit_box(0.0));
        bvh.insert(1u32, unit_box(5.0));
        let before = bvh.fat_aabb(leaf).unwrap();

        assert!(!bvh.update(leaf, unit_box(0.3)));
        assert_eq!(bvh.fat_aabb(leaf).unwrap(), before);
        assert!(bvh.validate());
    }

    #[test]
    fn test_update_outside_fat_bounds_reinserts() {
        let mut bvh = Bvh::new(0.1);
        let leaf = bvh.insert(0u32, unit_box(0.0));
        bvh.insert(1u32, unit_box(5.0));

        assert!(bvh.update(leaf, unit_box(10.0)));
        let fat = bvh.fat_aabb(leaf).unwrap();
        assert!(fat.contains_aabb(&unit_box(10.0)));
        assert_eq!(bvh.key(leaf), Some(0));
        assert!(bvh.validate());
    }

    #[test]
    fn test_stale_leaf_is_ignored() {
        let mut bvh = Bvh::new(0.1);
        let leaf = bvh.insert(0u32, unit_box(0.0));
        bvh.insert(1u32, unit_box(3.0));
        assert_eq!(bvh.remove(leaf), Some(0));

        assert_eq!(bvh.remove(leaf), None);
        assert!(!bvh.update(leaf, unit_box(100.0)));
        assert_eq!(bvh.key(leaf), None);
        assert_eq!(bvh.len(), 1);
        assert!(bvh.validate());
    }

    #[test]
    fn test_query_aabb_matches_brute_force() {
        let mut rng = Lcg(99);
        let mut bvh = Bvh::new(0.1);
        let mut boxes = Vec::new();
        for i in 0..150u32 {
            let aabb = rng.aabb(40.0);
            let leaf = bvh.insert(i, aabb);
            boxes.push((i, leaf));
        }

        for _ in 0..20 {
            let query = rng.aabb(40.0).expanded(3.0);
            let mut found = HashSet::new();
            bvh.query_aabb(&query, |_, key| {
                assert!(found.insert(key), "leaf reported twice");
            });

            let expected: HashSet<u32> = boxes
                .iter()
                .filter(|(_, leaf)| bvh.fat_aabb(*leaf).unwrap().overlaps(&query))
                .map(|(key, _)| *key)
                .collect();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_all_pairs_reported_exactly_once() {
        let mut rng = Lcg(2024);
        let mut bvh = Bvh::new(0.1);
        let mut leaves = Vec::new();
        for i in 0..120u32 {
            leaves.push((i, bvh.insert(i, rng.aabb(15.0))));
        }

        let mut found = HashSet::new();
        bvh.query_all_pairs(|a, b| {
            assert_ne!(a, b);
            assert!(found.insert(sorted_pair(a, b)), "pair reported twice");
        });

        let mut expected = HashSet::new();
        for (i, (key_a, leaf_a)) in leaves.iter().enumerate() {
            for (key_b, leaf_b) in &leaves[i + 1..] {
                if bvh.fat_aabb(*leaf_a).unwrap().overlaps(&bvh.fat_aabb(*leaf_b).unwrap()) {
                    expected.insert(sorted_pair(*key_a, *key_b));
                }
            }
        }
        assert_eq!(found, expected);
    }

    #[test]
    fn test_query_ray_prunes_and_stops_early() {
        let mut bvh = Bvh::new(0.0);
        for i in 0..10u32 {
            bvh.insert(i, unit_box(i as f32 * 3.0));
        }
        bvh.insert(100, AABB::from_center_half_extents(Vec3::new(0.0, 10.0, 0.0), Vec3::repeat(0.5)));

        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut hits = Vec::new();
        bvh.query_ray(&ray, |_, key| {
            hits.push(key);
            true
        });
        hits.sort_unstable();
        assert_eq!(hits, (0..10).collect::<Vec<_>>());

        let mut visits = 0;
        bvh.query_ray(&ray, |_, _| {
            visits += 1;
            false
        });
        assert_eq!(visits, 1);

        let short = ray.with_max_distance(5.0);
        let mut near = Vec::new();
        bvh.query_ray(&short, |_, key| {
            near.push(key);
            true
        });
        assert_eq!(near, vec![0]);
    }

    #[test]
    fn test_sorted_inserts_stay_balanced() {
        // Inserting along a line is the worst case for an unbalanced tree
        let mut bvh = Bvh::new(0.0);
        for i in 0..256u32 {
            bvh.insert(i, unit_box(i as f32 * 2.0));
        }
        assert!(bvh.validate());
        assert!(bvh.height() <= 20, "height {} too large", bvh.height());
    }

    #[test]
    fn test_visit_nodes_and_clear() {
        let mut bvh = Bvh::new(0.1);
        for i in 0..5u32 {
            bvh.insert(i, unit_box(i as f32));
        }
        let mut leaves = 0;
        let mut nodes = 0;
        bvh.visit_nodes(|_, _, is_leaf| {
            nodes += 1;
            if is_leaf {
                leaves += 1;
            }
        });
        assert_eq!(leaves, 5);
        assert_eq!(nodes, 9);
        assert_eq!(bvh.leaves().count(), 5);
        assert!(bvh.area_ratio() >= 1.0);

        bvh.clear();
        assert!(bvh.is_empty());
        assert!(bvh.validate());
    }
}
