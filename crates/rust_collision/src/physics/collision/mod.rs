//! Collision shapes, rays, and collider storage

pub mod attached;
pub mod primitives;
pub mod shape;

pub use attached::{
    AttachedCollider, ColliderBody, ColliderEntry, ColliderKey, ColliderSet, ColliderSource,
    ColliderView, EntityTag,
};
pub use primitives::{
    closest_point_on_segment, closest_point_on_segment_to_aabb, closest_points_between_segments, Ray, RayHit, RayIntersection,
    RaycastResult,
};
pub use shape::{Collider, Shape, ShapeKind};
