//! Scene-side transform storage consumed by attached colliders

pub mod transform_hierarchy;

pub use transform_hierarchy::{PoseSource, TransformHierarchy, TransformKey, TransformNode};
