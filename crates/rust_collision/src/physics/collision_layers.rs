//! Collision layer system for filtering collision detection
//!
//! Every collider carries a layer (what it is) and a mask (what it reacts
//! to). Two colliders interact only when each one's layer is in the other's
//! mask.

use bitflags::bitflags;

bitflags! {
    /// Collision layer bits
    ///
    /// Bits 0-7 are the standard game layers; bits 8-31 are free for
    /// user-defined layers via [`CollisionLayers::custom`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CollisionLayers: u32 {
        /// Player character layer
        const PLAYER = 1 << 0;
        /// Enemy character layer
        const ENEMY = 1 << 1;
        /// Projectiles (bullets, missiles, etc.)
        const PROJECTILE = 1 << 2;
        /// Static environment geometry
        const ENVIRONMENT = 1 << 3;
        /// Trigger volumes (no physical response)
        const TRIGGER = 1 << 4;
        /// Debris and small physics objects
        const DEBRIS = 1 << 5;
        /// Vehicles
        const VEHICLE = 1 << 6;
        /// Pickups and collectibles
        const PICKUP = 1 << 7;
        /// All collision layers, including custom ones
        const ALL = u32::MAX;
    }
}

impl CollisionLayers {
    /// First bit available for user-defined layers
    pub const FIRST_CUSTOM_BIT: u32 = 8;

    /// A user-defined layer occupying `bit` (8..=31)
    ///
    /// Returns `None` for bits reserved by the standard layers or out of range.
    pub fn custom(bit: u32) -> Option<Self> {
        (Self::FIRST_CUSTOM_BIT..32)
            .contains(&bit)
            .then(|| Self::from_bits_retain(1 << bit))
    }

    /// Check if two entities should collide based on their layers and masks
    ///
    /// A's layer must be in B's mask and B's layer must be in A's mask.
    ///
    /// # Example
    /// ```
    /// use rust_collision::physics::CollisionLayers;
    ///
    /// let player = (CollisionLayers::PLAYER, CollisionLayers::ENEMY | CollisionLayers::ENVIRONMENT);
    /// let enemy = (CollisionLayers::ENEMY, CollisionLayers::PLAYER | CollisionLayers::PROJECTILE);
    ///
    /// assert!(CollisionLayers::should_collide(player.0, player.1, enemy.0, enemy.1));
    /// ```
    pub fn should_collide(
        layer_a: CollisionLayers,
        mask_a: CollisionLayers,
        layer_b: CollisionLayers,
        mask_b: CollisionLayers,
    ) -> bool {
        layer_a.intersects(mask_b) && layer_b.intersects(mask_a)
    }
}

/// Layer and mask pair carried by every collider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionFilter {
    /// Layers this collider belongs to
    pub layer: CollisionLayers,
    /// Layers this collider reacts to
    pub mask: CollisionLayers,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::new(CollisionLayers::ALL, CollisionLayers::ALL)
    }
}

impl CollisionFilter {
    /// Create a filter from a layer and a mask
    pub const fn new(layer: CollisionLayers, mask: CollisionLayers) -> Self {
        Self { layer, mask }
    }

    /// Mutual layer/mask test against another filter
    pub fn should_collide(&self, other: &CollisionFilter) -> bool {
        CollisionLayers::should_collide(self.layer, self.mask, other.layer, other.mask)
    }
}
