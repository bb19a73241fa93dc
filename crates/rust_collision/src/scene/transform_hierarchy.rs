//! Parent/child transform storage
//!
//! Transforms live in a generational slot map. A [`TransformKey`] stays
//! valid until its node is removed; afterwards every lookup through it
//! fails instead of aliasing a newer node.

use crate::foundation::collections::{new_key_type, SlotMap};
use crate::foundation::math::{Pose, Transform};

new_key_type! {
    /// Generational handle to a node in a [`TransformHierarchy`]
    pub struct TransformKey;
}

/// Resolves transform handles to world-space poses
///
/// Attached colliders only hold a [`TransformKey`]; whoever owns the
/// transforms implements this trait so collision code can read them
/// without owning them.
pub trait PoseSource {
    /// World-space pose of `key`, or `None` when the handle is stale
    fn global_pose(&self, key: TransformKey) -> Option<Pose>;
}

/// A local transform and its optional parent
#[derive(Debug, Clone)]
pub struct TransformNode {
    /// Transform relative to the parent (or world when there is none)
    pub local: Transform,
    parent: Option<TransformKey>,
}

impl TransformNode {
    /// Parent handle, if any
    pub fn parent(&self) -> Option<TransformKey> {
        self.parent
    }
}

/// Flat storage of transform nodes with parent links
#[derive(Debug, Default)]
pub struct TransformHierarchy {
    nodes: SlotMap<TransformKey, TransformNode>,
}

impl TransformHierarchy {
    /// Create an empty hierarchy
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a root transform
    pub fn insert(&mut self, local: Transform) -> TransformKey {
        self.nodes.insert(TransformNode { local, parent: None })
    }

    /// Insert a transform under `parent`
    ///
    /// Returns `None` if the parent handle is stale.
    pub fn insert_child(&mut self, parent: TransformKey, local: Transform) -> Option<TransformKey> {
        if !self.nodes.contains_key(parent) {
            return None;
        }
        Some(self.nodes.insert(TransformNode { local, parent: Some(parent) }))
    }

    /// Remove a transform
    ///
    /// Children are left in place; their world poses stop resolving until
    /// they are removed as well.
    pub fn remove(&mut self, key: TransformKey) -> Option<Transform> {
        self.nodes.remove(key).map(|node| node.local)
    }

    /// Check whether a handle is still live
    pub fn contains(&self, key: TransformKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Get a node
    pub fn get(&self, key: TransformKey) -> Option<&TransformNode> {
        self.nodes.get(key)
    }

    /// Local transform of a node
    pub fn local(&self, key: TransformKey) -> Option<&Transform> {
        self.nodes.get(key).map(|node| &node.local)
    }

    /// Replace the local transform of a node
    ///
    /// Returns `false` if the handle is stale.
    pub fn set_local(&mut self, key: TransformKey, local: Transform) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.local = local;
                true
            }
            None => false,
        }
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the hierarchy is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// World transform of a node, composed through all of its ancestors
    ///
    /// Returns `None` if the node or any ancestor has been removed.
    pub fn global_transform(&self, key: TransformKey) -> Option<Transform> {
        let node = self.nodes.get(key)?;
        let mut world = node.local.clone();
        let mut parent = node.parent;
        while let Some(parent_key) = parent {
            let parent_node = self.nodes.get(parent_key)?;
            world = parent_node.local.combine(&world);
            parent = parent_node.parent;
        }
        Some(world)
    }
}

impl PoseSource for TransformHierarchy {
    fn global_pose(&self, key: TransformKey) -> Option<Pose> {
        self.global_transform(key).map(|transform| transform.pose())
    }
}
