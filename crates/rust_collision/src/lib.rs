//! # Rust Collision
//!
//! Collision detection for the Rust engine: a dynamic BVH broad phase, exact
//! narrow-phase tests between primitive shapes, and a collision world that
//! ties them together.
//!
//! ## Features
//!
//! - **Dynamic BVH**: Incremental insert/remove/update with fattened leaves
//! - **Primitive Shapes**: Sphere, box and capsule colliders
//! - **Contact Manifolds**: Up to four contact points per colliding pair
//! - **Spatial Queries**: AABB overlap, ray casts, all overlapping pairs
//! - **Collision Layers**: Bitflag layer/mask filtering
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_collision::prelude::*;
//!
//! let transforms = TransformHierarchy::new();
//! let mut colliders = ColliderSet::new();
//! let mut world = CollisionWorld::new();
//!
//! let a = colliders.insert_fixed(Collider::sphere(1.0));
//! let b = colliders.insert_fixed(Collider::sphere(1.0).with_position(Vec3::new(1.5, 0.0, 0.0)));
//!
//! let view = colliders.view(&transforms);
//! world.add(a, &view);
//! world.add(b, &view);
//!
//! let manifolds = world.detect_contacts(&view);
//! assert_eq!(manifolds.len(), 1);
//!
//! let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
//! let closest = world.raycast_closest(&ray, &view);
//! assert!(closest.hit);
//! assert_eq!(closest.collider, a);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod physics;
pub mod scene;
pub mod spatial;

/// Common imports for collision users
pub mod prelude {
    pub use crate::{
        config::{CollisionConfig, Config, ConfigError},
        foundation::math::{Pose, Quat, Transform, Vec3},
        physics::{
            AttachedCollider, Collider, ColliderKey, ColliderSet, ColliderSource, CollisionFilter,
            CollisionLayers, CollisionWorld, ContactManifold, ContactPoint, EntityTag, Ray, RayHit,
            RaycastResult, Shape,
        },
        scene::{PoseSource, TransformHierarchy, TransformKey},
        spatial::{Bvh, LeafId, AABB},
    };
}
