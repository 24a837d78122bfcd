//! Geometry kernel: planar polygons, closed polyhedra and principal axes

pub mod pca;
pub mod polygon;
pub mod polyhedron;

pub use pca::{principal_axes, PrincipalAxes};
pub use polyhedron::{Polygon3, Polyhedron};
