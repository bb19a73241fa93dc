//! Spatial data structures

pub mod aabb;
pub mod bvh;

pub use aabb::AABB;
pub use bvh::{Bvh, LeafId};
