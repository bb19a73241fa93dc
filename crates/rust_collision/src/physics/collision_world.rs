//! Collision world: broad phase plus narrow phase
//!
//! The world owns a [`Bvh`] over collider keys and a key to leaf side
//! table. It never owns shapes: every call that needs geometry takes a
//! [`ColliderSource`] and resolves world-space colliders through it.
//! Detection is non-incremental; each [`CollisionWorld::detect_contacts`]
//! call returns a fresh set of manifolds.

use std::collections::HashMap;

use crate::config::CollisionConfig;
use crate::foundation::collections::Key;
use crate::foundation::logging::{debug, trace, warn};
use crate::physics::collision::{ColliderKey, ColliderSource, Ray, RayHit, RaycastResult};
use crate::physics::collision_layers::CollisionLayers;
use crate::physics::manifold::ContactManifold;
use crate::physics::narrow_phase;
use crate::spatial::aabb::AABB;
use crate::spatial::bvh::{Bvh, LeafId};

/// Broad-phase tree and bookkeeping for a set of colliders
#[derive(Debug)]
pub struct CollisionWorld {
    bvh: Bvh<ColliderKey>,
    leaves: HashMap<ColliderKey, LeafId>,
    config: CollisionConfig,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionWorld {
    /// Create an empty world with default tunables
    pub fn new() -> Self {
        Self::with_config(CollisionConfig::default())
    }

    /// Create an empty world with the given tunables
    pub fn with_config(config: CollisionConfig) -> Self {
        Self {
            bvh: Bvh::new(config.fat_margin),
            leaves: HashMap::new(),
            config,
        }
    }

    /// Active tunables
    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// Read access to the broad-phase tree, e.g. for debug drawing
    pub fn bvh(&self) -> &Bvh<ColliderKey> {
        &self.bvh
    }

    /// Number of registered colliders
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True when no collider is registered
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Check if a collider is registered
    pub fn contains(&self, key: ColliderKey) -> bool {
        self.leaves.contains_key(&key)
    }

    /// Register a collider with the broad phase
    ///
    /// Adding a key that is already registered refreshes its bounds. Returns
    /// `false` if the collider cannot be resolved through `colliders`.
    pub fn add(&mut self, key: ColliderKey, colliders: &impl ColliderSource) -> bool {
        let Some(collider) = colliders.world_collider(key) else {
            warn!("Cannot add collider {:?}: it does not resolve to a world shape", key);
            return false;
        };
        let aabb = collider.aabb();

        match self.leaves.get(&key) {
            Some(&leaf) => {
                self.bvh.update(leaf, aabb);
            }
            None => {
                let leaf = self.bvh.insert(key, aabb);
                self.leaves.insert(key, leaf);
            }
        }
        true
    }

    /// Unregister a collider
    ///
    /// Returns `false` (and does nothing) if the key was not registered.
    pub fn remove(&mut self, key: ColliderKey) -> bool {
        match self.leaves.remove(&key) {
            Some(leaf) => {
                self.bvh.remove(leaf);
                true
            }
            None => {
                trace!("Ignoring removal of unregistered collider {:?}", key);
                false
            }
        }
    }

    /// Refresh the broad-phase bounds of a collider after it moved or changed
    ///
    /// Returns `true` only if the tree was restructured. Small moves inside
    /// the fattening margin, unregistered keys and colliders that no longer
    /// resolve all return `false`.
    pub fn update_pose(&mut self, key: ColliderKey, colliders: &impl ColliderSource) -> bool {
        let Some(&leaf) = self.leaves.get(&key) else {
            trace!("Ignoring pose update of unregistered collider {:?}", key);
            return false;
        };
        let Some(collider) = colliders.world_collider(key) else {
            return false;
        };
        self.bvh.update(leaf, collider.aabb())
    }

    /// Remove every collider
    pub fn clear(&mut self) {
        self.bvh.clear();
        self.leaves.clear();
    }

    /// Compute contact manifolds for every overlapping pair
    ///
    /// Pairs rejected by their layer filters, pairs whose collider cannot be
    /// resolved, and pairs whose exact shapes do not touch are dropped.
    pub fn detect_contacts(&self, colliders: &impl ColliderSource) -> Vec<ContactManifold> {
        // Phase 1: Broad-phase - overlapping fat bounds from the tree
        let candidates = self.broad_phase(colliders);

        // Phase 2: Narrow-phase - exact shape tests
        let manifolds = self.narrow_phase(candidates, colliders);

        debug!("detect_contacts: {} colliders, {} manifolds", self.len(), manifolds.len());
        manifolds
    }

    fn broad_phase(&self, colliders: &impl ColliderSource) -> Vec<(ColliderKey, ColliderKey)> {
        let mut pairs = Vec::new();
        self.bvh.query_all_pairs(|a, b| {
            // Layer filtering before any geometry work
            if !colliders.filter(a).should_collide(&colliders.filter(b)) {
                return;
            }
            // Stable A/B order regardless of tree layout
            if a.data().as_ffi() <= b.data().as_ffi() {
                pairs.push((a, b));
            } else {
                pairs.push((b, a));
            }
        });
        pairs
    }

    fn narrow_phase(
        &self,
        candidates: Vec<(ColliderKey, ColliderKey)>,
        colliders: &impl ColliderSource,
    ) -> Vec<ContactManifold> {
        candidates
            .into_iter()
            .filter_map(|(key_a, key_b)| {
                let a = colliders.world_collider(key_a)?;
                let b = colliders.world_collider(key_b)?;
                narrow_phase::collide(key_a, &a, key_b, &b, self.config.contact_tolerance)
            })
            .collect()
    }

    /// Keys of every collider whose fat bounds overlap `aabb`
    ///
    /// This is a broad-phase query: results may include colliders whose
    /// exact shape lies just outside `aabb`, but never miss one inside it.
    pub fn query_aabb(&self, aabb: &AABB) -> Vec<ColliderKey> {
        let mut keys = Vec::new();
        self.bvh.query_aabb(aabb, |_, key| keys.push(key));
        keys
    }

    /// All colliders hit by `ray`, nearest first
    ///
    /// Hits closer than `ray_min_distance` or beyond the ray's (and the
    /// configured) maximum distance are discarded.
    pub fn raycast(&self, ray: &Ray, colliders: &impl ColliderSource) -> Vec<RayHit> {
        self.collect_hits(ray, colliders, CollisionLayers::ALL)
    }

    /// The nearest collider hit by `ray`
    pub fn raycast_closest(&self, ray: &Ray, colliders: &impl ColliderSource) -> RaycastResult {
        self.raycast(ray, colliders).into_iter().next().into()
    }

    /// The nearest collider hit by `ray` whose layer intersects `layer_mask`
    pub fn raycast_filtered(
        &self,
        ray: &Ray,
        colliders: &impl ColliderSource,
        layer_mask: CollisionLayers,
    ) -> RaycastResult {
        self.collect_hits(ray, colliders, layer_mask)
            .into_iter()
            .next()
            .into()
    }

    fn collect_hits(&self, ray: &Ray, colliders: &impl ColliderSource, layer_mask: CollisionLayers) -> Vec<RayHit> {
        let max_distance = ray.max_distance.min(self.config.max_ray_distance);
        let bounded = ray.with_max_distance(max_distance);

        let mut candidates = Vec::new();
        self.bvh.query_ray(&bounded, |_, key| {
            candidates.push(key);
            true
        });

        let mut hits: Vec<RayHit> = candidates
            .into_iter()
            .filter(|&key| colliders.filter(key).layer.intersects(layer_mask))
            .filter_map(|key| {
                let collider = colliders.world_collider(key)?;
                let hit = collider.ray_intersect(&bounded)?;
                (hit.distance >= self.config.ray_min_distance && hit.distance <= max_distance).then_some(RayHit {
                    collider: key,
                    distance: hit.distance,
                    point: hit.point,
                    normal: hit.normal,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }
}
