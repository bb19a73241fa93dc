//! Specialized collection types

pub use slotmap::{new_key_type, Key, KeyData, SlotMap};
