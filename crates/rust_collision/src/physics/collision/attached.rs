//! Collider storage and transform-attached colliders
//!
//! Colliders are owned by a [`ColliderSet`] and referred to everywhere else
//! by [`ColliderKey`]. The collision world never owns shapes; it reads them
//! through the [`ColliderSource`] trait each time it needs world-space data.

use crate::foundation::collections::{new_key_type, SlotMap};
use crate::foundation::logging::warn;
use crate::foundation::math::{Pose, Vec3};
use crate::physics::collision_layers::{CollisionFilter, CollisionLayers};
use crate::physics::collision_world::CollisionWorld;
use crate::scene::{PoseSource, TransformKey};
use crate::spatial::aabb::AABB;
use super::shape::Collider;

new_key_type! {
    /// Generational handle to a collider in a [`ColliderSet`]
    pub struct ColliderKey;
}

/// Opaque tag linking a collider back to a game entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityTag(pub u64);

/// A collider that follows a transform in a [`PoseSource`]
///
/// `collider.pose` is the offset from the transform. World-space data is
/// derived on demand, so it is never stale relative to the transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachedCollider {
    /// Shape and local offset
    pub collider: Collider,
    /// Transform the collider follows
    pub transform: TransformKey,
    /// Owning entity
    pub entity: EntityTag,
}

impl AttachedCollider {
    /// Attach `collider` to `transform`
    pub fn new(collider: Collider, transform: TransformKey, entity: EntityTag) -> Self {
        Self { collider, transform, entity }
    }

    /// World pose of the shape, or `None` when the transform is gone
    pub fn pose(&self, poses: &impl PoseSource) -> Option<Pose> {
        poses
            .global_pose(self.transform)
            .map(|parent| parent.compose(&self.collider.pose))
    }

    /// The collider re-expressed in world space
    pub fn world_collider(&self, poses: &impl PoseSource) -> Option<Collider> {
        poses
            .global_pose(self.transform)
            .map(|parent| self.collider.transformed(&parent))
    }

    /// World-space bounds
    pub fn aabb(&self, poses: &impl PoseSource) -> Option<AABB> {
        self.world_collider(poses).map(|collider| collider.aabb())
    }

    /// World-space shape center
    pub fn center(&self, poses: &impl PoseSource) -> Option<Vec3> {
        self.pose(poses).map(|pose| pose.position)
    }
}

/// Where a collider gets its world pose from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderBody {
    /// Pose is already in world space
    Fixed(Collider),
    /// Pose is relative to a transform
    Attached(AttachedCollider),
}

/// A stored collider with its filtering data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderEntry {
    /// Shape and pose source
    pub body: ColliderBody,
    /// Layer and mask
    pub filter: CollisionFilter,
}

impl ColliderEntry {
    /// Builder pattern: Set layer and mask
    pub fn with_layers(mut self, layer: CollisionLayers, mask: CollisionLayers) -> Self {
        self.filter = CollisionFilter::new(layer, mask);
        self
    }

    /// Owning entity, for attached colliders
    pub fn entity(&self) -> Option<EntityTag> {
        match &self.body {
            ColliderBody::Fixed(_) => None,
            ColliderBody::Attached(attached) => Some(attached.entity),
        }
    }

    /// Resolve the world-space collider
    pub fn world_collider(&self, poses: &impl PoseSource) -> Option<Collider> {
        match &self.body {
            ColliderBody::Fixed(collider) => Some(*collider),
            ColliderBody::Attached(attached) => attached.world_collider(poses),
        }
    }
}

/// Read access to world-space colliders by key
///
/// This is the only way the collision world sees shapes.
pub trait ColliderSource {
    /// World-space collider for `key`, or `None` if it cannot be resolved
    fn world_collider(&self, key: ColliderKey) -> Option<Collider>;

    /// Layer and mask for `key`; colliders without one interact with everything
    fn filter(&self, _key: ColliderKey) -> CollisionFilter {
        CollisionFilter::default()
    }
}

/// Owning storage for colliders
#[derive(Debug, Default)]
pub struct ColliderSet {
    colliders: SlotMap<ColliderKey, ColliderEntry>,
}

impl ColliderSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a world-space collider
    pub fn insert_fixed(&mut self, collider: Collider) -> ColliderKey {
        self.insert(ColliderEntry {
            body: ColliderBody::Fixed(collider),
            filter: CollisionFilter::default(),
        })
    }

    /// Store a collider attached to a transform
    pub fn insert_attached(&mut self, attached: AttachedCollider) -> ColliderKey {
        self.insert(ColliderEntry {
            body: ColliderBody::Attached(attached),
            filter: CollisionFilter::default(),
        })
    }

    /// Store a fully specified entry
    pub fn insert(&mut self, entry: ColliderEntry) -> ColliderKey {
        self.colliders.insert(entry)
    }

    /// Get an entry
    pub fn get(&self, key: ColliderKey) -> Option<&ColliderEntry> {
        self.colliders.get(key)
    }

    /// Get a mutable entry
    ///
    /// Pose or shape edits only reach the broad phase after
    /// [`CollisionWorld::update_pose`].
    pub fn get_mut(&mut self, key: ColliderKey) -> Option<&mut ColliderEntry> {
        self.colliders.get_mut(key)
    }

    /// Set layer and mask of a collider; returns `false` for a stale key
    pub fn set_filter(&mut self, key: ColliderKey, filter: CollisionFilter) -> bool {
        match self.colliders.get_mut(key) {
            Some(entry) => {
                entry.filter = filter;
                true
            }
            None => false,
        }
    }

    /// Remove a collider, unregistering it from `world` first
    ///
    /// Keeps the world from holding a key whose collider no longer exists.
    pub fn detach(&mut self, key: ColliderKey, world: &mut CollisionWorld) -> Option<ColliderEntry> {
        world.remove(key);
        self.colliders.remove(key)
    }

    /// Check whether a key is live
    pub fn contains(&self, key: ColliderKey) -> bool {
        self.colliders.contains_key(key)
    }

    /// Number of stored colliders
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (ColliderKey, &ColliderEntry)> {
        self.colliders.iter()
    }

    /// Pair this set with a pose source so the collision world can read it
    pub fn view<'a, P: PoseSource>(&'a self, poses: &'a P) -> ColliderView<'a, P> {
        ColliderView { set: self, poses }
    }
}

/// A [`ColliderSet`] bound to the poses its attached colliders follow
#[derive(Debug)]
pub struct ColliderView<'a, P> {
    set: &'a ColliderSet,
    poses: &'a P,
}

impl<P: PoseSource> ColliderView<'_, P> {
    /// Owning entity of a collider
    pub fn entity(&self, key: ColliderKey) -> Option<EntityTag> {
        self.set.get(key).and_then(ColliderEntry::entity)
    }
}

impl<P: PoseSource> ColliderSource for ColliderView<'_, P> {
    fn world_collider(&self, key: ColliderKey) -> Option<Collider> {
        let entry = self.set.get(key)?;
        let collider = entry.world_collider(self.poses);
        if collider.is_none() {
            warn!("Collider {:?} follows a transform that no longer exists", key);
        }
        collider
    }

    fn filter(&self, key: ColliderKey) -> CollisionFilter {
        self.set
            .get(key)
            .map(|entry| entry.filter)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::scene::TransformHierarchy;
    use approx::assert_relative_eq;

    #[test]
    fn test_attached_collider_follows_transform() {
        let mut transforms = TransformHierarchy::new();
        let body = transforms.insert(Transform::from_position(Vec3::new(3.0, 0.0, 0.0)));
        let attached = AttachedCollider::new(
            Collider::sphere(0.5).with_position(Vec3::new(0.0, 1.0, 0.0)),
            body,
            EntityTag(7),
        );

        assert_relative_eq!(attached.center(&transforms).unwrap(), Vec3::new(3.0, 1.0, 0.0));

        transforms.set_local(body, Transform::from_position(Vec3::new(-3.0, 0.0, 0.0)));
        let aabb = attached.aabb(&transforms).unwrap();
        assert_relative_eq!(aabb.center(), Vec3::new(-3.0, 1.0, 0.0));
    }

    #[test]
    fn test_attached_collider_with_stale_transform() {
        let mut transforms = TransformHierarchy::new();
        let body = transforms.insert(Transform::identity());
        let attached = AttachedCollider::new(Collider::sphere(1.0), body, EntityTag(1));
        transforms.remove(body);

        assert!(attached.pose(&transforms).is_none());
        assert!(attached.aabb(&transforms).is_none());
        assert!(attached.world_collider(&transforms).is_none());
    }

    #[test]
    fn test_view_resolves_fixed_and_attached() {
        let mut transforms = TransformHierarchy::new();
        let body = transforms.insert(Transform::from_position(Vec3::new(0.0, 2.0, 0.0)));

        let mut set = ColliderSet::new();
        let fixed = set.insert_fixed(Collider::sphere(1.0));
        let attached = set.insert_attached(AttachedCollider::new(Collider::sphere(1.0), body, EntityTag(42)));
        set.set_filter(attached, CollisionFilter::new(CollisionLayers::PLAYER, CollisionLayers::ENEMY));

        let view = set.view(&transforms);
        assert_relative_eq!(view.world_collider(fixed).unwrap().center(), Vec3::zeros());
        assert_relative_eq!(view.world_collider(attached).unwrap().center(), Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(view.entity(attached), Some(EntityTag(42)));
        assert_eq!(view.entity(fixed), None);
        assert_eq!(view.filter(attached).layer, CollisionLayers::PLAYER);
        assert_eq!(view.filter(fixed), CollisionFilter::default());
    }
}
