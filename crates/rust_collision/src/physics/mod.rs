//! Physics module for collision detection
//!
//! Broad phase through a dynamic BVH, exact narrow-phase tests for sphere,
//! box and capsule colliders, and contact manifolds for a downstream solver.
//! Contact resolution itself is not part of this module.

pub mod collision;
pub mod collision_layers;
pub mod collision_world;
pub mod manifold;
pub mod narrow_phase;

#[cfg(test)]
mod tests;

pub use collision::{
    AttachedCollider, Collider, ColliderBody, ColliderEntry, ColliderKey, ColliderSet,
    ColliderSource, ColliderView, EntityTag, Ray, RayHit, RayIntersection, RaycastResult, Shape,
    ShapeKind,
};
pub use collision_layers::{CollisionFilter, CollisionLayers};
pub use collision_world::CollisionWorld;
pub use manifold::{ContactManifold, ContactPoint, ManifoldError, PairKey, MAX_CONTACT_POINTS};
