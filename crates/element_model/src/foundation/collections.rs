//! Specialized collection types

pub use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle of a node in an [`ElementTree`](crate::model::ElementTree)
    pub struct NodeKey;
}

/// Handle-based map for tree nodes
pub type NodeMap<T> = SlotMap<NodeKey, T>;

/// Unordered index pair stored with the smaller index first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPair(pub usize, pub usize);

impl IndexPair {
    /// Create a new pair (always stores the smaller index first for consistency)
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}
