//! Axis-aligned bounding boxes
//!
//! The broad-phase currency: every collider reports one, the BVH stores a
//! fattened one per leaf and a union per internal node.

use crate::foundation::math::Vec3;
use crate::physics::collision::Ray;

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given half-extents
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest AABB containing every point. Returns `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut aabb = Self::new(*first, *first);
        for point in rest {
            aabb.min = aabb.min.inf(point);
            aabb.max = aabb.max.sup(point);
        }
        Some(aabb)
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the half-extents of the AABB
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full size along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Sum of the six face areas. Used as the tree's node-quality heuristic.
    pub fn surface_area(&self) -> f32 {
        let d = self.size();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Smallest AABB containing both boxes
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Grow every side by `margin`
    pub fn expanded(&self, margin: f32) -> AABB {
        let pad = Vec3::repeat(margin);
        AABB {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Check if this AABB contains a point (boundary inclusive)
    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if `other` lies entirely inside this AABB
    pub fn contains_aabb(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x && self.min.y <= other.min.y && self.min.z <= other.min.z &&
        self.max.x >= other.max.x && self.max.y >= other.max.y && self.max.z >= other.max.z
    }

    /// Check if this AABB overlaps another AABB (touching counts)
    pub fn overlaps(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Check the `min <= max` invariant on every axis
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Test ray intersection with this AABB using slab method
    ///
    /// Returns the distance to the entry point if the ray hits within
    /// `ray.max_distance`, or 0 when the origin is inside the box.
    /// Based on "An Efficient and Robust Ray–Box Intersection Algorithm"
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let (t_enter, t_exit) = slab_interval(self.min, self.max, ray.origin, ray.direction)?;
        if t_exit < 0.0 || t_enter > ray.max_distance {
            return None;
        }
        Some(t_enter.max(0.0))
    }
}

/// Entry and exit parameters of the line `origin + t * dir` through a box.
///
/// Returns `None` when the line misses. Parallel axes are handled by
/// rejecting origins outside that slab instead of relying on infinities.
pub(crate) fn slab_interval(min: Vec3, max: Vec3, origin: Vec3, dir: Vec3) -> Option<(f32, f32)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;

    for axis in 0..3 {
        if dir[axis] == 0.0 {
            if origin[axis] < min[axis] || origin[axis] > max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir[axis];
        let mut t1 = (min[axis] - origin[axis]) * inv;
        let mut t2 = (max[axis] - origin[axis]) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_enter = t_enter.max(t1);
        t_exit = t_exit.min(t2);
        if t_enter > t_exit {
            return None;
        }
    }

    Some((t_enter, t_exit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> AABB {
        AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_aabb_contains_point() {
        let aabb = unit_box();

        assert!(aabb.contains(Vec3::zeros()));
        assert!(aabb.contains(Vec3::new(1.0, 1.0, 1.0)));
        assert!(!aabb.contains(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_overlaps() {
        let aabb1 = AABB::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        let aabb2 = AABB::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));
        let aabb3 = AABB::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(7.0, 7.0, 7.0));
        let touching = AABB::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 2.0, 2.0));

        assert!(aabb1.overlaps(&aabb2));
        assert!(!aabb1.overlaps(&aabb3));
        assert!(aabb1.overlaps(&touching));
    }

    #[test]
    fn test_union_contains_both() {
        let a = unit_box();
        let b = AABB::new(Vec3::new(3.0, -2.0, 0.0), Vec3::new(4.0, 0.0, 5.0));
        let u = a.union(&b);

        assert!(u.contains_aabb(&a));
        assert!(u.contains_aabb(&b));
        assert!(u.is_valid());
        assert_eq!(u.min, Vec3::new(-1.0, -2.0, -1.0));
        assert_eq!(u.max, Vec3::new(4.0, 1.0, 5.0));
    }

    #[test]
    fn test_surface_area() {
        assert_relative_eq!(unit_box().surface_area(), 24.0);
        let flat = AABB::new(Vec3::zeros(), Vec3::new(2.0, 3.0, 0.0));
        assert_relative_eq!(flat.surface_area(), 12.0);
    }

    #[test]
    fn test_expanded_strictly_contains() {
        let aabb = unit_box();
        let fat = aabb.expanded(0.1);
        assert!(fat.contains_aabb(&aabb));
        assert!(!aabb.contains_aabb(&fat));
    }

    #[test]
    fn test_from_points() {
        assert!(AABB::from_points(&[]).is_none());
        let aabb = AABB::from_points(&[
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-1.0, 4.0, 0.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 3.0));
    }

    #[test]
    fn test_ray_slab() {
        let aabb = unit_box();

        let hit = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(aabb.intersect_ray(&hit).unwrap(), 4.0, epsilon = 1e-5);

        let inside = Ray::new(Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(aabb.intersect_ray(&inside).unwrap(), 0.0);

        let parallel_miss = Ray::new(Vec3::new(-5.0, 2.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(aabb.intersect_ray(&parallel_miss).is_none());

        let behind = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(aabb.intersect_ray(&behind).is_none());

        let too_short = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))
            .with_max_distance(3.0);
        assert!(aabb.intersect_ray(&too_short).is_none());
    }
}
