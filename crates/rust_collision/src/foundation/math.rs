//! Math utilities and types
//!
//! Provides the vector, rotation and pose types shared by the spatial and
//! physics modules.

pub use nalgebra::{
    Vector3,
    Matrix3,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Tolerance used when normalizing near-degenerate directions
pub const EPSILON: f32 = 1.0e-6;

/// Transform representing position, rotation, and scale
///
/// Used by the transform hierarchy. Collision shapes only consume the rigid
/// part of it (see [`Pose`]); scale is expected to be baked into shape
/// parameters by whoever builds the collider.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Combine this (parent) transform with a child transform
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale.component_mul(&other.position)),
            rotation: self.rotation * other.rotation,
            scale: self.scale.component_mul(&other.scale),
        }
    }

    /// Rigid part of this transform (scale dropped)
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

/// Rigid pose: position and rotation, no scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in 3D space
    pub position: Vec3,
    /// Rotation quaternion
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Identity pose
    pub fn identity() -> Self {
        Self::new(Vec3::zeros(), Quat::identity())
    }

    /// Create a pose from position and rotation
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create a pose with identity rotation
    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::identity())
    }

    /// Compose `self` (parent) with a child pose expressed in this pose's frame
    pub fn compose(&self, child: &Pose) -> Pose {
        Pose {
            position: self.position + self.rotation * child.position,
            rotation: self.rotation * child.rotation,
        }
    }

    /// Map a point from local to world space
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    /// Map a direction from local to world space
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Map a point from world to local space
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&(point - self.position))
    }

    /// Map a direction from world to local space
    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&vector)
    }

    /// Rotation as a 3x3 matrix whose columns are the local axes in world space
    pub fn rotation_matrix(&self) -> Mat3 {
        *self.rotation.to_rotation_matrix().matrix()
    }
}

/// Math utility functions
pub mod utils {
    use super::{Vec3, EPSILON};

    /// Component-wise clamp of a vector into `[min, max]`
    pub fn clamp_vec3(value: Vec3, min: Vec3, max: Vec3) -> Vec3 {
        Vec3::new(
            value.x.clamp(min.x, max.x),
            value.y.clamp(min.y, max.y),
            value.z.clamp(min.z, max.z),
        )
    }

    /// Normalize `v`, falling back to `fallback` for near-zero vectors
    pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
        let length = v.magnitude();
        if length > EPSILON {
            v / length
        } else {
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_pose_compose_and_inverse() {
        let parent = Pose::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2),
        );
        let child = Pose::from_position(Vec3::new(1.0, 0.0, 0.0));
        let world = parent.compose(&child);

        // Child offset along +X is rotated onto +Y
        assert_relative_eq!(world.position, Vec3::new(1.0, 1.0, 0.0), epsilon = 1e-5);

        let local = world.inverse_transform_point(Vec3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(local, Vec3::zeros(), epsilon = 1e-5);
    }

    #[test]
    fn test_transform_combine_applies_parent_scale() {
        let parent = Transform {
            position: Vec3::new(0.0, 2.0, 0.0),
            rotation: Quat::identity(),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let child = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        let combined = parent.combine(&child);

        assert_relative_eq!(combined.position, Vec3::new(2.0, 2.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(combined.scale, Vec3::new(2.0, 2.0, 2.0), epsilon = 1e-6);
    }

    #[test]
    fn test_identity_pose_matches_default() {
        assert_relative_eq!(Pose::identity().rotation, Quat::identity(), epsilon = 1e-6);
        assert_eq!(Pose::default().position, Vec3::zeros());
    }
}
