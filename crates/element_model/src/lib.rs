//! # Element Model
//!
//! Composite models of discrete solid elements, organised both as a spatial
//! hierarchy and as an interaction graph, with bounding-volume indexing and
//! face-to-face contact detection.
//!
//! ## Features
//!
//! - **Element Tree**: Named groups and elements with parent-relative transformations
//! - **Interaction Graph**: Contacts, slice modifiers and declared relations between elements
//! - **Spatial Indexing**: AABB/OBB hierarchies and a KD-tree over element centroids
//! - **Contact Detection**: Broad phase over bounding volumes, narrow phase over coplanar faces
//! - **Lazy Caches**: Model-space transformations and geometry recomputed only when stale
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use element_model::prelude::*;
//!
//! fn main() -> Result<(), ModelError> {
//!     let mut model = Model::new("stack");
//!     let cube = Shape::Box { xsize: 1.0, ysize: 1.0, zsize: 1.0 };
//!
//!     model.add_element(Element::new(ElementId(0), "bottom", cube.clone())?, None)?;
//!     let top = Element::new(ElementId(1), "top", cube)?
//!         .with_transformation(Transform::from_translation(Vec3::new(0.0, 0.0, 1.0)));
//!     model.add_element(top, None)?;
//!
//!     let report = model.compute_contacts(&ContactSettings::default())?;
//!     println!("{report}");
//!     println!("{model}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod contact;
pub mod elements;
pub mod error;
pub mod foundation;
pub mod geometry;
pub mod model;
pub mod spatial;

/// Common imports for model users
pub mod prelude {
    pub use crate::{
        config::{BvhConfig, Config, ContactSettings},
        contact::{ContactDetector, ContactReport},
        elements::{Element, ElementGeometry, ElementId, Shape},
        error::{ModelError, ModelResult},
        foundation::{
            collections::NodeKey,
            math::{Frame, Plane, Point2, Point3, Transform, Vec3},
        },
        geometry::{Polygon3, Polyhedron},
        model::{
            ChildPolicy, Contact, ContactKind, ElementPair, Interaction, InteractionKind, Model, ModelData,
            Modifier,
        },
        spatial::{BoundingVolume, Bvh, KdTree, Ray, Segment, VolumeKind},
    };
}
