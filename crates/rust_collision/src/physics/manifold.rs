//! Contact manifolds
//!
//! A manifold groups up to [`MAX_CONTACT_POINTS`] contact points between one
//! pair of colliders. Normals always point from `collider_a` towards
//! `collider_b`; penetration is negative while the shapes overlap.

use thiserror::Error;

use crate::foundation::collections::Key;
use crate::foundation::math::Vec3;
use super::collision::ColliderKey;

/// Most contact points a single manifold can hold
pub const MAX_CONTACT_POINTS: usize = 4;

/// Manifold errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifoldError {
    /// Manifold already holds its maximum number of points
    #[error("Contact manifold is full ({capacity} points)")]
    Full {
        /// Point capacity of the manifold
        capacity: usize,
    },
}

/// A single contact between two shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// World-space contact location
    pub position: Vec3,
    /// Unit normal pointing from A towards B
    pub normal: Vec3,
    /// Signed separation along the normal; negative when overlapping
    pub penetration: f32,
}

impl ContactPoint {
    /// Create a new contact point
    pub fn new(position: Vec3, normal: Vec3, penetration: f32) -> Self {
        Self { position, normal, penetration }
    }

    /// Overlap depth as a positive number (zero when separated)
    pub fn depth(&self) -> f32 {
        (-self.penetration).max(0.0)
    }
}

impl Default for ContactPoint {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Vec3::zeros(), 0.0)
    }
}

/// Order-independent identity of a collider pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: u64,
    high: u64,
}

impl PairKey {
    /// Build the key for a pair; `(a, b)` and `(b, a)` give the same key
    pub fn new(a: ColliderKey, b: ColliderKey) -> Self {
        let a = a.data().as_ffi();
        let b = b.data().as_ffi();
        Self { low: a.min(b), high: a.max(b) }
    }
}

/// Contact points between one pair of colliders
#[derive(Debug, Clone, PartialEq)]
pub struct ContactManifold {
    /// First collider; normals point away from it
    pub collider_a: ColliderKey,
    /// Second collider; normals point towards it
    pub collider_b: ColliderKey,
    points: [ContactPoint; MAX_CONTACT_POINTS],
    len: usize,
}

impl ContactManifold {
    /// Create an empty manifold for a pair
    pub fn new(collider_a: ColliderKey, collider_b: ColliderKey) -> Self {
        Self {
            collider_a,
            collider_b,
            points: [ContactPoint::default(); MAX_CONTACT_POINTS],
            len: 0,
        }
    }

    /// Append a contact point
    pub fn add_point(&mut self, point: ContactPoint) -> Result<(), ManifoldError> {
        if self.len >= MAX_CONTACT_POINTS {
            return Err(ManifoldError::Full { capacity: MAX_CONTACT_POINTS });
        }
        self.points[self.len] = point;
        self.len += 1;
        Ok(())
    }

    /// The stored contact points
    pub fn points(&self) -> &[ContactPoint] {
        &self.points[..self.len]
    }

    /// Number of stored points
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no points are stored
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when no more points fit
    pub fn is_full(&self) -> bool {
        self.len == MAX_CONTACT_POINTS
    }

    /// Drop all points, keeping the pair
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The deepest contact point
    pub fn deepest(&self) -> Option<&ContactPoint> {
        self.points()
            .iter()
            .min_by(|a, b| a.penetration.partial_cmp(&b.penetration).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Order-independent identity of the pair
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.collider_a, self.collider_b)
    }

    /// True if both manifolds describe the same unordered pair
    pub fn same_pair(&self, other: &ContactManifold) -> bool {
        self.pair_key() == other.pair_key()
    }

    /// True if `key` is one of the two colliders
    pub fn involves(&self, key: ColliderKey) -> bool {
        self.collider_a == key || self.collider_b == key
    }

    /// The collider paired with `key`, if `key` is part of this manifold
    pub fn other(&self, key: ColliderKey) -> Option<ColliderKey> {
        if self.collider_a == key {
            Some(self.collider_b)
        } else if self.collider_b == key {
            Some(self.collider_a)
        } else {
            None
        }
    }

    /// Swap A and B, flipping every normal to match
    pub fn swapped(&self) -> ContactManifold {
        let mut swapped = self.clone();
        std::mem::swap(&mut swapped.collider_a, &mut swapped.collider_b);
        swapped.flip_normals();
        swapped
    }

    pub(crate) fn flip_normals(&mut self) {
        for point in &mut self.points[..self.len] {
            point.normal = -point.normal;
        }
    }
}
