//! Collider shapes
//!
//! A [`Collider`] is a primitive shape plus a pose. Shapes are stored in
//! their own local frame and only transformed when a test needs them
//! (see [`Collider::transformed`]), so one collider description can be reused
//! under any parent pose.

use crate::foundation::math::{Pose, Quat, Vec3};
use crate::spatial::aabb::{slab_interval, AABB};
use super::primitives::{smallest_non_negative_root, Ray, RayIntersection};

/// Primitive shape parameters, expressed in the collider's local frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Sphere centered on the local origin
    Sphere {
        /// Sphere radius
        radius: f32,
    },
    /// Box centered on the local origin
    Box {
        /// Half size along each local axis
        half_extents: Vec3,
    },
    /// Capsule whose core segment runs along local Y from `-half_height` to `+half_height`
    Capsule {
        /// Radius around the core segment
        radius: f32,
        /// Half length of the core segment (caps excluded)
        half_height: f32,
    },
}

/// Shape discriminant, handy for logging and dispatch tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// [`Shape::Sphere`]
    Sphere,
    /// [`Shape::Box`]
    Box,
    /// [`Shape::Capsule`]
    Capsule,
}

impl Shape {
    /// The variant tag of this shape
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Sphere { .. } => ShapeKind::Sphere,
            Self::Box { .. } => ShapeKind::Box,
            Self::Capsule { .. } => ShapeKind::Capsule,
        }
    }
}

/// A primitive collision shape with a pose
///
/// The pose is relative to whatever frame the collider lives in: world space
/// for free-standing colliders, the owning transform for attached ones.
/// There is no scale; callers bake it into the shape parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    /// Shape parameters
    pub shape: Shape,
    /// Position and rotation of the shape
    pub pose: Pose,
}

impl Collider {
    /// Creates a collider from a shape at the identity pose
    pub fn new(shape: Shape) -> Self {
        Self { shape, pose: Pose::identity() }
    }

    /// Creates a spherical collider
    pub fn sphere(radius: f32) -> Self {
        Self::new(Shape::Sphere { radius })
    }

    /// Creates a box collider from its half extents
    pub fn box_shape(half_extents: Vec3) -> Self {
        Self::new(Shape::Box { half_extents })
    }

    /// Creates a Y-aligned capsule collider
    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Self::new(Shape::Capsule { radius, half_height })
    }

    /// Builder pattern: Set pose
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Builder pattern: Set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.pose.position = position;
        self
    }

    /// Builder pattern: Set rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.pose.rotation = rotation;
        self
    }

    /// The variant tag of the shape
    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// Shape center (the pose position)
    pub fn center(&self) -> Vec3 {
        self.pose.position
    }

    /// Radius of spheres and capsules
    pub fn radius(&self) -> Option<f32> {
        match self.shape {
            Shape::Sphere { radius } | Shape::Capsule { radius, .. } => Some(radius),
            Shape::Box { .. } => None,
        }
    }

    /// Half extents of boxes
    pub fn half_extents(&self) -> Option<Vec3> {
        match self.shape {
            Shape::Box { half_extents } => Some(half_extents),
            _ => None,
        }
    }

    /// Half height of the capsule core segment
    pub fn half_height(&self) -> Option<f32> {
        match self.shape {
            Shape::Capsule { half_height, .. } => Some(half_height),
            _ => None,
        }
    }

    /// Endpoints of the capsule core segment in this collider's frame
    pub fn segment(&self) -> Option<(Vec3, Vec3)> {
        self.half_height().map(|half_height| {
            let axis = self.pose.transform_vector(Vec3::new(0.0, half_height, 0.0));
            (self.pose.position - axis, self.pose.position + axis)
        })
    }

    /// Re-express this collider under a parent pose
    pub fn transformed(&self, parent: &Pose) -> Collider {
        Collider {
            shape: self.shape,
            pose: parent.compose(&self.pose),
        }
    }

    /// Tight axis-aligned bounds at the current pose
    pub fn aabb(&self) -> AABB {
        match self.shape {
            Shape::Sphere { radius } => {
                AABB::from_center_half_extents(self.pose.position, Vec3::repeat(radius))
            }
            Shape::Box { half_extents } => {
                // Extent along each world axis is |R| * h
                let extent = self.pose.rotation_matrix().abs() * half_extents;
                AABB::from_center_half_extents(self.pose.position, extent)
            }
            Shape::Capsule { radius, half_height } => {
                let axis = self.pose.transform_vector(Vec3::new(0.0, half_height, 0.0));
                let extent = axis.abs() + Vec3::repeat(radius);
                AABB::from_center_half_extents(self.pose.position, extent)
            }
        }
    }

    /// Test ray intersection with this shape
    ///
    /// Returns the first surface crossing at or beyond the ray origin; a ray
    /// starting inside the shape reports where it exits. `ray.max_distance`
    /// is not applied here.
    pub fn ray_intersect(&self, ray: &Ray) -> Option<RayIntersection> {
        match self.shape {
            Shape::Sphere { radius } => ray_sphere(ray, self.pose.position, radius),
            Shape::Box { half_extents } => self.ray_box(ray, half_extents),
            Shape::Capsule { radius, half_height } => self.ray_capsule(ray, radius, half_height),
        }
    }

    fn ray_box(&self, ray: &Ray, half_extents: Vec3) -> Option<RayIntersection> {
        let origin = self.pose.inverse_transform_point(ray.origin);
        let dir = self.pose.inverse_transform_vector(ray.direction);

        let (t_enter, t_exit) = slab_interval(-half_extents, half_extents, origin, dir)?;
        if t_exit < 0.0 {
            return None;
        }
        let distance = if t_enter >= 0.0 { t_enter } else { t_exit };

        // The face hit is the axis where the local point sits closest to its extent
        let local_point = origin + dir * distance;
        let mut axis = 0;
        let mut best = f32::NEG_INFINITY;
        for i in 0..3 {
            let ratio = if half_extents[i] > 0.0 {
                local_point[i].abs() / half_extents[i]
            } else {
                f32::INFINITY
            };
            if ratio > best {
                best = ratio;
                axis = i;
            }
        }
        let mut local_normal = Vec3::zeros();
        local_normal[axis] = local_point[axis].signum();

        Some(RayIntersection {
            distance,
            point: ray.point_at(distance),
            normal: self.pose.transform_vector(local_normal),
        })
    }

    fn ray_capsule(&self, ray: &Ray, radius: f32, half_height: f32) -> Option<RayIntersection> {
        let o = self.pose.inverse_transform_point(ray.origin);
        let d = self.pose.inverse_transform_vector(ray.direction);
        let radius_sq = radius * radius;

        // (distance, local normal) of the nearest crossing found so far
        let mut best: Option<(f32, Vec3)> = None;
        let mut consider = |t: f32, normal: Vec3| {
            if t >= 0.0 && best.map_or(true, |(current, _)| t < current) {
                best = Some((t, normal));
            }
        };

        // Cylinder body: both roots, kept only inside the segment span
        let a = d.x * d.x + d.z * d.z;
        let b = 2.0 * (o.x * d.x + o.z * d.z);
        let c = o.x * o.x + o.z * o.z - radius_sq;
        let discriminant = b * b - 4.0 * a * c;
        if a > f32::EPSILON && discriminant >= 0.0 {
            let sqrt_discriminant = discriminant.sqrt();
            for t in [(-b - sqrt_discriminant) / (2.0 * a), (-b + sqrt_discriminant) / (2.0 * a)] {
                let p = o + d * t;
                if p.y.abs() <= half_height {
                    consider(t, Vec3::new(p.x, 0.0, p.z) / radius);
                }
            }
        }

        // Hemispherical caps: both roots, kept only on the outer half
        for sign in [1.0_f32, -1.0] {
            let cap = Vec3::new(0.0, sign * half_height, 0.0);
            let oc = o - cap;
            let b = 2.0 * oc.dot(&d);
            let c = oc.magnitude_squared() - radius_sq;
            let discriminant = b * b - 4.0 * c;
            if discriminant < 0.0 {
                continue;
            }
            let sqrt_discriminant = discriminant.sqrt();
            for t in [(-b - sqrt_discriminant) * 0.5, (-b + sqrt_discriminant) * 0.5] {
                let p = o + d * t;
                if (p.y - cap.y) * sign >= 0.0 {
                    consider(t, (p - cap) / radius);
                }
            }
        }

        best.map(|(distance, local_normal)| RayIntersection {
            distance,
            point: ray.point_at(distance),
            normal: self.pose.transform_vector(local_normal),
        })
    }
}

fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<RayIntersection> {
    // Solve: |origin + t*direction - center|^2 = radius^2
    let oc = ray.origin - center;
    let a = ray.direction.dot(&ray.direction);
    let b = 2.0 * oc.dot(&ray.direction);
    let c = oc.dot(&oc) - radius * radius;

    let distance = smallest_non_negative_root(a, b, c)?;
    let point = ray.point_at(distance);
    let normal = if radius > 0.0 { (point - center) / radius } else { -ray.direction };
    Some(RayIntersection { distance, point, normal })
}
