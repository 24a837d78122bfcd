//! Spatial partitioning data structures
//!
//! Bounding volumes, a bounding volume hierarchy for overlap and ray queries,
//! and a k-d tree for proximity queries. Both indices are rebuildable
//! snapshots over the current element set.

mod bounding_volume;
mod bvh;
mod kdtree;

pub use bounding_volume::{BoundingVolume, Ray, Segment, VolumeKind};
pub use bvh::{Bvh, BvhNode, BvhNodeKind};
pub use kdtree::KdTree;
