//! Integration tests for colliders attached to a transform hierarchy
//!
//! Colliders follow their transforms once `update_pose` is called, and
//! colliders whose transform disappeared silently drop out of results.

use crate::foundation::math::{Quat, Transform, Vec3};
use crate::physics::{
    AttachedCollider, Collider, ColliderKey, ColliderSet, ColliderSource, CollisionWorld, EntityTag, Ray,
};
use crate::scene::{TransformHierarchy, TransformKey};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::logging;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    struct Scene {
        transforms: TransformHierarchy,
        colliders: ColliderSet,
        world: CollisionWorld,
    }

    impl Scene {
        fn new() -> Self {
            logging::init();
            Self {
                transforms: TransformHierarchy::new(),
                colliders: ColliderSet::new(),
                world: CollisionWorld::new(),
            }
        }

        fn spawn(&mut self, collider: Collider, position: Vec3, entity: u64) -> (TransformKey, ColliderKey) {
            let transform = self.transforms.insert(Transform::from_position(position));
            let key = self
                .colliders
                .insert_attached(AttachedCollider::new(collider, transform, EntityTag(entity)));
            assert!(self.world.add(key, &self.colliders.view(&self.transforms)));
            (transform, key)
        }

        fn move_to(&mut self, transform: TransformKey, key: ColliderKey, position: Vec3) -> bool {
            self.transforms.set_local(transform, Transform::from_position(position));
            self.world.update_pose(key, &self.colliders.view(&self.transforms))
        }

        fn contact_count(&self) -> usize {
            self.world.detect_contacts(&self.colliders.view(&self.transforms)).len()
        }
    }

    #[test]
    fn test_attached_collider_follows_transform() {
        let mut scene = Scene::new();
        let (_, anchor) = scene.spawn(Collider::sphere(1.0), Vec3::zeros(), 1);
        let (body, mover) = scene.spawn(Collider::sphere(1.0), Vec3::new(5.0, 0.0, 0.0), 2);
        assert_eq!(scene.contact_count(), 0);

        assert!(scene.move_to(body, mover, Vec3::new(1.5, 0.0, 0.0)));
        let manifolds = scene.world.detect_contacts(&scene.colliders.view(&scene.transforms));
        assert_eq!(manifolds.len(), 1);
        assert_eq!(manifolds[0].other(anchor), Some(mover));

        let view = scene.colliders.view(&scene.transforms);
        assert_eq!(view.entity(mover), Some(EntityTag(2)));
    }

    #[test]
    fn test_offset_collider_under_parent_transform() {
        let mut scene = Scene::new();
        let parent = scene.transforms.insert(Transform::from_position_rotation(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2),
        ));
        let child = scene
            .transforms
            .insert_child(parent, Transform::from_position(Vec3::new(2.0, 0.0, 0.0)))
            .unwrap();
        let key = scene.colliders.insert_attached(AttachedCollider::new(
            Collider::sphere(0.5).with_position(Vec3::new(0.0, 1.0, 0.0)),
            child,
            EntityTag(3),
        ));
        assert!(scene.world.add(key, &scene.colliders.view(&scene.transforms)));

        // Parent turns +X into +Y and the collider offset +Y into -X
        let ray = Ray::new(Vec3::new(9.0, -10.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let hit = scene.world.raycast_closest(&ray, &scene.colliders.view(&scene.transforms));
        assert!(hit.hit);
        assert_eq!(hit.collider, key);
        assert_relative_eq!(hit.point, Vec3::new(9.0, 1.5, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_stale_transform_drops_collider() {
        let mut scene = Scene::new();
        let (_, anchor) = scene.spawn(Collider::sphere(1.0), Vec3::zeros(), 1);
        let (body, ghost) = scene.spawn(Collider::sphere(1.0), Vec3::new(1.0, 0.0, 0.0), 2);
        assert_eq!(scene.contact_count(), 1);

        scene.transforms.remove(body);
        assert_eq!(scene.contact_count(), 0);
        assert!(!scene.world.update_pose(ghost, &scene.colliders.view(&scene.transforms)));

        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let hits = scene.world.raycast(&ray, &scene.colliders.view(&scene.transforms));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].collider, anchor);

        // A collider whose transform is gone cannot be registered
        let mut fresh = CollisionWorld::new();
        assert!(!fresh.add(ghost, &scene.colliders.view(&scene.transforms)));
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_mixed_shapes_on_transforms() {
        let mut scene = Scene::new();
        let (_, floor) = scene.spawn(Collider::box_shape(Vec3::new(5.0, 0.5, 5.0)), Vec3::zeros(), 1);
        let (_, barrel) = scene.spawn(Collider::capsule(0.5, 1.0), Vec3::new(0.0, 1.8, 0.0), 2);
        let (_, ball) = scene.spawn(Collider::sphere(0.5), Vec3::new(3.0, 0.9, 0.0), 3);
        let (_, _far) = scene.spawn(Collider::sphere(0.5), Vec3::new(30.0, 0.0, 0.0), 4);

        let manifolds = scene.world.detect_contacts(&scene.colliders.view(&scene.transforms));
        assert_eq!(manifolds.len(), 2);
        for manifold in &manifolds {
            assert!(manifold.involves(floor));
            assert!(manifold.involves(barrel) || manifold.involves(ball));
            for point in manifold.points() {
                assert!(point.penetration < 0.0);
                let normal_from_floor = if manifold.collider_a == floor { point.normal } else { -point.normal };
                assert_relative_eq!(normal_from_floor, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_random_motion_keeps_tree_valid() {
        let mut scene = Scene::new();
        let mut bodies = Vec::new();
        let mut state = 17u64;
        let mut next = move || {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            ((state >> 40) as f32) / ((1u64 << 24) as f32) * 40.0 - 20.0
        };

        for i in 0..60 {
            let position = Vec3::new(next(), next(), next());
            let shape = match i % 3 {
                0 => Collider::sphere(0.75),
                1 => Collider::box_shape(Vec3::new(0.5, 0.75, 1.0)),
                _ => Collider::capsule(0.4, 0.8),
            };
            bodies.push(scene.spawn(shape, position, i));
        }

        for _ in 0..10 {
            for &(transform, key) in &bodies {
                let position = Vec3::new(next(), next(), next());
                scene.move_to(transform, key, position);
            }
            assert!(scene.world.bvh().validate());
            assert_eq!(scene.world.bvh().len(), bodies.len());

            // Every reported pair really overlaps
            let view = scene.colliders.view(&scene.transforms);
            for manifold in scene.world.detect_contacts(&view) {
                assert!(!manifold.is_empty());
                let a = view.world_collider(manifold.collider_a).unwrap();
                let b = view.world_collider(manifold.collider_b).unwrap();
                assert!(a.aabb().overlaps(&b.aabb()));
            }
        }
    }
}
