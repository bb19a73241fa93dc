//! Primitive collision types and helper algorithms
//!
//! Rays, ray hit records, and the closest-point routines the narrow phase
//! builds on.

use crate::foundation::collections::Key;
use crate::foundation::math::{utils, Vec3, EPSILON};
use crate::spatial::aabb::slab_interval;
use super::attached::ColliderKey;

/// A ray for ray casting and picking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized on construction)
    pub direction: Vec3,
    /// Hits further than this along the ray are ignored
    pub max_distance: f32,
}

impl Ray {
    /// Creates a new unbounded ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            max_distance: f32::INFINITY,
        }
    }

    /// Creates a ray from `start` towards `end`, limited to their distance
    pub fn from_points(start: Vec3, end: Vec3) -> Self {
        let delta = end - start;
        Self::new(start, delta).with_max_distance(delta.magnitude())
    }

    /// Builder pattern: limit the ray length
    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Where a ray meets a single shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayIntersection {
    /// The distance from the ray origin to the hit point
    pub distance: f32,
    /// The point of intersection in world space
    pub point: Vec3,
    /// The outward surface normal at the intersection point
    pub normal: Vec3,
}

/// Result of a ray cast against a collider in a collision world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// The collider that was hit
    pub collider: ColliderKey,
    /// The distance from the ray origin to the hit point
    pub distance: f32,
    /// The point of intersection in world space
    pub point: Vec3,
    /// The surface normal at the intersection point
    pub normal: Vec3,
}

/// Outcome of a closest-hit ray cast
///
/// `hit` is the only field to branch on. When it is `false` the remaining
/// fields hold placeholder values (null key, infinite distance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastResult {
    /// Whether anything was hit
    pub hit: bool,
    /// The collider that was hit
    pub collider: ColliderKey,
    /// The distance from the ray origin to the hit point
    pub distance: f32,
    /// The point of intersection in world space
    pub point: Vec3,
    /// The surface normal at the intersection point
    pub normal: Vec3,
}

impl RaycastResult {
    /// A result describing a miss
    pub fn miss() -> Self {
        Self {
            hit: false,
            collider: ColliderKey::null(),
            distance: f32::INFINITY,
            point: Vec3::zeros(),
            normal: Vec3::zeros(),
        }
    }

    /// The hit record, if there was one
    pub fn as_hit(&self) -> Option<RayHit> {
        self.hit.then_some(RayHit {
            collider: self.collider,
            distance: self.distance,
            point: self.point,
            normal: self.normal,
        })
    }
}

impl Default for RaycastResult {
    fn default() -> Self {
        Self::miss()
    }
}

impl From<Option<RayHit>> for RaycastResult {
    fn from(hit: Option<RayHit>) -> Self {
        match hit {
            Some(hit) => Self {
                hit: true,
                collider: hit.collider,
                distance: hit.distance,
                point: hit.point,
                normal: hit.normal,
            },
            None => Self::miss(),
        }
    }
}

/// Closest point on segment `[a, b]` to `point`, with its segment parameter
pub fn closest_point_on_segment(a: Vec3, b: Vec3, point: Vec3) -> (Vec3, f32) {
    let ab = b - a;
    let length_sq = ab.magnitude_squared();
    if length_sq <= EPSILON * EPSILON {
        return (a, 0.0);
    }
    let t = ((point - a).dot(&ab) / length_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

/// Closest points between segments `[p1, q1]` and `[p2, q2]`
///
/// Follows Ericson, "Real-Time Collision Detection" 5.1.9. Degenerate
/// (point-like) segments are handled explicitly.
pub fn closest_points_between_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.magnitude_squared();
    let e = d2.magnitude_squared();
    let f = d2.dot(&r);

    let eps = EPSILON * EPSILON;
    if a <= eps && e <= eps {
        return (p1, p2);
    }

    let (s, t) = if a <= eps {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= eps {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            // Parallel segments: any s works, pick the start
            let mut s = if denom > eps { ((b * f - c * e) / denom).clamp(0.0, 1.0) } else { 0.0 };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    (p1 + d1 * s, p2 + d2 * t)
}

/// Point on segment `[a, b]` closest to the box `[min, max]`, with its segment parameter
///
/// Squared distance to the box is convex and piecewise quadratic along the
/// segment, breaking wherever the segment crosses a slab plane. Each piece is
/// minimised in closed form. A segment that passes through the box returns
/// the middle of the span inside it.
pub fn closest_point_on_segment_to_aabb(a: Vec3, b: Vec3, min: Vec3, max: Vec3) -> (Vec3, f32) {
    let d = b - a;
    if let Some((t_enter, t_exit)) = slab_interval(min, max, a, d) {
        let enter = t_enter.max(0.0);
        let exit = t_exit.min(1.0);
        if enter <= exit {
            let t = (enter + exit) * 0.5;
            return (a + d * t, t);
        }
    }

    let mut breaks = [0.0_f32; 8];
    breaks[1] = 1.0;
    let mut count = 2;
    for axis in 0..3 {
        if d[axis] == 0.0 {
            continue;
        }
        for bound in [min[axis], max[axis]] {
            let t = (bound - a[axis]) / d[axis];
            if t > EPSILON && t < 1.0 - EPSILON {
                breaks[count] = t;
                count += 1;
            }
        }
    }
    let breaks = &mut breaks[..count];
    breaks.sort_by(f32::total_cmp);

    let distance_sq = |t: f32| {
        let point = a + d * t;
        (point - utils::clamp_vec3(point, min, max)).magnitude_squared()
    };
    let flat = EPSILON * d.magnitude_squared();

    let mut best_t = 0.0;
    let mut best = f32::INFINITY;
    for piece in breaks.windows(2) {
        let (t0, t1) = (piece[0], piece[1]);
        let mid = a + d * ((t0 + t1) * 0.5);

        // Axes outside their slab over this piece pull toward the bound they exceed
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for axis in 0..3 {
            let bound = if mid[axis] < min[axis] {
                min[axis]
            } else if mid[axis] > max[axis] {
                max[axis]
            } else {
                continue;
            };
            numerator += d[axis] * (bound - a[axis]);
            denominator += d[axis] * d[axis];
        }
        let t = if denominator > flat {
            (numerator / denominator).clamp(t0, t1)
        } else {
            (t0 + t1) * 0.5
        };

        let value = distance_sq(t);
        if value < best {
            best = value;
            best_t = t;
        }
    }

    (a + d * best_t, best_t)
}

/// Solve `a t^2 + b t + c = 0` for the smallest root not behind the origin
///
/// Returns the first non-negative root, or the second one when the origin is
/// inside the surface.
pub(crate) fn smallest_non_negative_root(a: f32, b: f32, c: f32) -> Option<f32> {
    if a.abs() <= EPSILON {
        return None;
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_discriminant = discriminant.sqrt();
    let t1 = (-b - sqrt_discriminant) / (2.0 * a);
    let t2 = (-b + sqrt_discriminant) / (2.0 * a);
    if t1 >= 0.0 {
        Some(t1)
    } else if t2 >= 0.0 {
        Some(t2)
    } else {
        None
    }
}
