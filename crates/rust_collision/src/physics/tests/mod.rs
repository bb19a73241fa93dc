//! End-to-end collision world scenarios

mod attached_colliders;
