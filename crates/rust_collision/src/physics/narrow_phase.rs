//! Narrow-phase contact generation
//!
//! Exact overlap tests for every pair of primitive shapes. Each routine
//! works on world-space colliders and writes contact points into a
//! [`ContactManifold`] whose normals point from A towards B. Mirrored pairs
//! (box/sphere, capsule/sphere, box/capsule) reuse the routine for the
//! other order and flip the normals afterwards.
//!
//! `tolerance` is the separation below which contacts are emitted: zero
//! reports only overlapping shapes, a positive value also reports shapes
//! that are closer than that.

use crate::foundation::math::{utils, Pose, Vec3, EPSILON};
use super::collision::{
    closest_point_on_segment, closest_point_on_segment_to_aabb, closest_points_between_segments, Collider,
    ColliderKey, Shape,
};
use super::manifold::{ContactManifold, ContactPoint, MAX_CONTACT_POINTS};

/// Points closer than this are merged into one contact
const MERGE_DISTANCE: f32 = 1.0e-3;

/// Slack when testing whether a box vertex lies inside the other box
const VERTEX_SLACK: f32 = 1.0e-4;

/// Generate contacts between two world-space colliders
///
/// Returns `None` when the shapes do not touch.
pub fn collide(
    key_a: ColliderKey,
    a: &Collider,
    key_b: ColliderKey,
    b: &Collider,
    tolerance: f32,
) -> Option<ContactManifold> {
    let mut manifold = ContactManifold::new(key_a, key_b);

    match (a.shape, b.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(&mut manifold, a.center(), ra, b.center(), rb, tolerance);
        }
        (Shape::Sphere { radius }, Shape::Box { half_extents }) => {
            sphere_box(&mut manifold, a.center(), radius, &b.pose, half_extents, tolerance);
        }
        (Shape::Box { half_extents }, Shape::Sphere { radius }) => {
            sphere_box(&mut manifold, b.center(), radius, &a.pose, half_extents, tolerance);
            manifold.flip_normals();
        }
        (Shape::Sphere { radius }, Shape::Capsule { radius: capsule_radius, .. }) => {
            let (p, q) = b.segment()?;
            sphere_capsule(&mut manifold, a.center(), radius, p, q, capsule_radius, tolerance);
        }
        (Shape::Capsule { radius: capsule_radius, .. }, Shape::Sphere { radius }) => {
            let (p, q) = a.segment()?;
            sphere_capsule(&mut manifold, b.center(), radius, p, q, capsule_radius, tolerance);
            manifold.flip_normals();
        }
        (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) => {
            box_box(&mut manifold, &a.pose, ha, &b.pose, hb, tolerance);
        }
        (Shape::Capsule { radius, .. }, Shape::Box { half_extents }) => {
            let segment = a.segment()?;
            capsule_box(&mut manifold, segment, radius, &b.pose, half_extents, tolerance);
        }
        (Shape::Box { half_extents }, Shape::Capsule { radius, .. }) => {
            let segment = b.segment()?;
            capsule_box(&mut manifold, segment, radius, &a.pose, half_extents, tolerance);
            manifold.flip_normals();
        }
        (Shape::Capsule { radius: ra, .. }, Shape::Capsule { radius: rb, .. }) => {
            capsule_capsule(&mut manifold, a.segment()?, ra, b.segment()?, rb, tolerance);
        }
    }

    (!manifold.is_empty()).then_some(manifold)
}

/// Add a point unless one already sits at (nearly) the same position
fn push_unique(manifold: &mut ContactManifold, point: ContactPoint) -> bool {
    let duplicate = manifold
        .points()
        .iter()
        .any(|existing| (existing.position - point.position).magnitude_squared() < MERGE_DISTANCE * MERGE_DISTANCE);
    !duplicate && manifold.add_point(point).is_ok()
}

fn sphere_sphere(
    out: &mut ContactManifold,
    center_a: Vec3,
    radius_a: f32,
    center_b: Vec3,
    radius_b: f32,
    tolerance: f32,
) {
    let delta = center_b - center_a;
    let distance = delta.magnitude();
    let separation = distance - (radius_a + radius_b);
    if separation >= tolerance {
        return;
    }

    // Concentric spheres have no preferred direction
    let normal = if distance > EPSILON { delta / distance } else { Vec3::y() };
    let on_a = center_a + normal * radius_a;
    let on_b = center_b - normal * radius_b;
    push_unique(out, ContactPoint::new((on_a + on_b) * 0.5, normal, separation));
}

fn sphere_box(
    out: &mut ContactManifold,
    center: Vec3,
    radius: f32,
    box_pose: &Pose,
    half_extents: Vec3,
    tolerance: f32,
) {
    let local = box_pose.inverse_transform_point(center);
    let clamped = utils::clamp_vec3(local, -half_extents, half_extents);

    if clamped == local {
        // Center inside the box: push out through the nearest face
        let mut axis = 0;
        let mut sign = 1.0;
        let mut face_distance = f32::INFINITY;
        for i in 0..3 {
            let to_positive = half_extents[i] - local[i];
            let to_negative = half_extents[i] + local[i];
            if to_positive < face_distance {
                face_distance = to_positive;
                axis = i;
                sign = 1.0;
            }
            if to_negative < face_distance {
                face_distance = to_negative;
                axis = i;
                sign = -1.0;
            }
        }

        let mut local_outward = Vec3::zeros();
        local_outward[axis] = sign;
        let outward = box_pose.transform_vector(local_outward);
        let mut local_face = local;
        local_face[axis] = sign * half_extents[axis];
        let on_box = box_pose.transform_point(local_face);
        let on_sphere = center - outward * radius;

        let separation = -(face_distance + radius);
        if separation < tolerance {
            push_unique(out, ContactPoint::new((on_box + on_sphere) * 0.5, -outward, separation));
        }
        return;
    }

    let on_box = box_pose.transform_point(clamped);
    let delta = on_box - center;
    let distance = delta.magnitude();
    let separation = distance - radius;
    if separation >= tolerance {
        return;
    }
    let normal = utils::normalize_or(delta, Vec3::y());
    let on_sphere = center + normal * radius;
    push_unique(out, ContactPoint::new((on_box + on_sphere) * 0.5, normal, separation));
}

fn sphere_capsule(
    out: &mut ContactManifold,
    center: Vec3,
    radius: f32,
    segment_start: Vec3,
    segment_end: Vec3,
    capsule_radius: f32,
    tolerance: f32,
) {
    let (closest, _) = closest_point_on_segment(segment_start, segment_end, center);
    sphere_sphere(out, center, radius, closest, capsule_radius, tolerance);
}

fn capsule_capsule(
    out: &mut ContactManifold,
    (p1, q1): (Vec3, Vec3),
    radius_a: f32,
    (p2, q2): (Vec3, Vec3),
    radius_b: f32,
    tolerance: f32,
) {
    let (c1, c2) = closest_points_between_segments(p1, q1, p2, q2);
    sphere_sphere(out, c1, radius_a, c2, radius_b, tolerance);
    if out.is_empty() {
        return;
    }

    // Parallel cores touch along a line; add the ends of the shared span
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let parallel = d1.cross(&d2).magnitude_squared() <= EPSILON * d1.magnitude_squared() * d2.magnitude_squared();
    if !parallel {
        return;
    }
    for end in [p1, q1] {
        let (on_b, _) = closest_point_on_segment(p2, q2, end);
        sphere_sphere(out, end, radius_a, on_b, radius_b, tolerance);
    }
    for end in [p2, q2] {
        let (on_a, _) = closest_point_on_segment(p1, q1, end);
        sphere_sphere(out, on_a, radius_a, end, radius_b, tolerance);
    }
}

fn capsule_box(
    out: &mut ContactManifold,
    (start, end): (Vec3, Vec3),
    radius: f32,
    box_pose: &Pose,
    half_extents: Vec3,
    tolerance: f32,
) {
    // Closest segment point to the box, solved exactly in box space
    let (on_segment, _) = closest_point_on_segment_to_aabb(
        box_pose.inverse_transform_point(start),
        box_pose.inverse_transform_point(end),
        -half_extents,
        half_extents,
    );
    let closest = box_pose.transform_point(on_segment);

    for candidate in [closest, start, end] {
        sphere_box(out, candidate, radius, box_pose, half_extents, tolerance);
    }
}

/// Oriented box axes as world-space unit vectors
fn box_axes(pose: &Pose) -> [Vec3; 3] {
    [
        pose.transform_vector(Vec3::x()),
        pose.transform_vector(Vec3::y()),
        pose.transform_vector(Vec3::z()),
    ]
}

/// Half length of a box's projection onto `axis`
fn projected_radius(axes: &[Vec3; 3], half_extents: Vec3, axis: &Vec3) -> f32 {
    (0..3).map(|i| half_extents[i] * axes[i].dot(axis).abs()).sum()
}

fn box_vertices(pose: &Pose, half_extents: Vec3) -> [Vec3; 8] {
    let mut vertices = [Vec3::zeros(); 8];
    for (i, vertex) in vertices.iter_mut().enumerate() {
        let signs = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        *vertex = pose.transform_point(half_extents.component_mul(&signs));
    }
    vertices
}

fn point_in_box(point: Vec3, pose: &Pose, half_extents: Vec3, slack: f32) -> bool {
    let local = pose.inverse_transform_point(point);
    (0..3).all(|i| local[i].abs() <= half_extents[i] + slack)
}

/// Separating axis test over the 15 candidate axes of two oriented boxes
fn box_box(
    out: &mut ContactManifold,
    pose_a: &Pose,
    half_a: Vec3,
    pose_b: &Pose,
    half_b: Vec3,
    tolerance: f32,
) {
    let axes_a = box_axes(pose_a);
    let axes_b = box_axes(pose_b);
    let offset = pose_b.position - pose_a.position;

    let mut min_overlap = f32::MAX;
    let mut best_axis = Vec3::zeros();

    let mut candidates: Vec<Vec3> = Vec::with_capacity(15);
    candidates.extend_from_slice(&axes_a);
    candidates.extend_from_slice(&axes_b);
    for axis_a in &axes_a {
        for axis_b in &axes_b {
            let cross = axis_a.cross(axis_b);
            let length = cross.magnitude();
            // Parallel edges add nothing the face axes do not cover
            if length > EPSILON {
                candidates.push(cross / length);
            }
        }
    }

    for axis in &candidates {
        let overlap = projected_radius(&axes_a, half_a, axis) + projected_radius(&axes_b, half_b, axis)
            - offset.dot(axis).abs();
        if -overlap >= tolerance {
            return;
        }
        // Strict comparison keeps face axes ahead of equivalent edge axes
        if overlap < min_overlap {
            min_overlap = overlap;
            best_axis = *axis;
        }
    }

    let normal = if best_axis.dot(&offset) < 0.0 { -best_axis } else { best_axis };
    let face_a = pose_a.position.dot(&normal) + projected_radius(&axes_a, half_a, &normal);
    let face_b = pose_b.position.dot(&normal) - projected_radius(&axes_b, half_b, &normal);
    let slack = tolerance.max(0.0) + VERTEX_SLACK;

    // Vertices of each box that lie inside the other one
    let mut points: Vec<ContactPoint> = Vec::with_capacity(16);
    for vertex in box_vertices(pose_b, half_b) {
        if point_in_box(vertex, pose_a, half_a, slack) {
            let penetration = vertex.dot(&normal) - face_a;
            points.push(ContactPoint::new(vertex - normal * (penetration * 0.5), normal, penetration));
        }
    }
    for vertex in box_vertices(pose_a, half_a) {
        if point_in_box(vertex, pose_b, half_b, slack) {
            let penetration = face_b - vertex.dot(&normal);
            points.push(ContactPoint::new(vertex + normal * (penetration * 0.5), normal, penetration));
        }
    }

    if points.is_empty() {
        // Edge against edge: one point halfway between the faces, laterally
        // centered on the smaller box
        let contact_depth = (face_a + face_b) * 0.5;
        let reference = if projected_radius(&axes_a, half_a, &normal) > projected_radius(&axes_b, half_b, &normal) {
            pose_b.position
        } else {
            pose_a.position
        };
        let position = reference + normal * (contact_depth - reference.dot(&normal));
        push_unique(out, ContactPoint::new(position, normal, -min_overlap));
        return;
    }

    points.sort_by(|a, b| a.penetration.partial_cmp(&b.penetration).unwrap_or(std::cmp::Ordering::Equal));
    for point in points {
        if out.len() == MAX_CONTACT_POINTS {
            break;
        }
        push_unique(out, point);
    }
}
