//! Contact detection between element faces
//!
//! The detector runs a broad phase over bounding volumes and a narrow phase
//! over coplanar, opposed boundary faces; see [`ContactDetector::run`].

mod detector;
mod narrow_phase;

pub use detector::{ContactDetector, ContactReport};
pub use narrow_phase::{NarrowPhase, CONTACT_SLACK};
