//! Element shape kinds
//!
//! Every shape lowers to a closed [`Polyhedron`] in element-local coordinates,
//! which is what the contact and indexing code works with.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::foundation::math::{Point2, Point3, Vec3};
use crate::geometry::{Polygon3, Polyhedron};
use crate::spatial::{BoundingVolume, VolumeKind};

/// Read access to element geometry needed by the spatial and contact layers
pub trait ElementGeometry {
    /// Points whose hull bounds the geometry
    fn points(&self) -> Vec<Point3>;

    /// Geometric center, `None` for empty geometry
    fn centroid(&self) -> Option<Point3>;

    /// Planar boundary faces with outward normals
    fn boundary_polygons(&self) -> Vec<Polygon3>;

    /// Axis-aligned box around the geometry grown by `inflate`
    fn compute_aabb(&self, inflate: f64) -> ModelResult<BoundingVolume> {
        BoundingVolume::from_points(VolumeKind::Aabb, &self.points(), inflate)
    }

    /// Oriented box around the geometry grown by `inflate`
    fn compute_obb(&self, inflate: f64) -> ModelResult<BoundingVolume> {
        BoundingVolume::from_points(VolumeKind::Obb, &self.points(), inflate)
    }
}

impl ElementGeometry for Polyhedron {
    fn points(&self) -> Vec<Point3> {
        self.vertices.clone()
    }

    fn centroid(&self) -> Option<Point3> {
        Polyhedron::centroid(self)
    }

    fn boundary_polygons(&self) -> Vec<Polygon3> {
        Polyhedron::boundary_polygons(self)
    }
}

/// Shape of an element in its local frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Arbitrary closed solid
    Block(Polyhedron),

    /// Box with its minimum corner at the local origin
    Box {
        /// Size along X
        xsize: f64,
        /// Size along Y
        ysize: f64,
        /// Size along Z
        zsize: f64,
    },

    /// Rectangular section centered on the local X axis, running from x = 0 to x = `length`
    Beam {
        /// Section size along Y
        width: f64,
        /// Section size along Z
        height: f64,
        /// Length along X
        length: f64,
    },

    /// Rectangular section centered on the local Z axis, running from z = 0 to z = `height`
    Column {
        /// Section size along X
        width: f64,
        /// Section size along Y
        depth: f64,
        /// Height along Z
        height: f64,
    },

    /// Outline in the local XY plane extruded along +Z
    Plate {
        /// Outline polygon, either orientation
        outline: Vec<Point2>,
        /// Extrusion distance
        thickness: f64,
    },
}

impl Shape {
    /// Short lowercase name of the shape kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Block(_) => "block",
            Shape::Box { .. } => "box",
            Shape::Beam { .. } => "beam",
            Shape::Column { .. } => "column",
            Shape::Plate { .. } => "plate",
        }
    }

    /// Closed solid for this shape
    pub fn to_polyhedron(&self) -> ModelResult<Polyhedron> {
        let lowered = match self {
            Shape::Block(polyhedron) => polyhedron.validate().map(|()| polyhedron.clone()),
            Shape::Box { xsize, ysize, zsize } => {
                Polyhedron::from_box(Point3::origin(), Vec3::new(*xsize, *ysize, *zsize))
            }
            Shape::Beam { width, height, length } => Polyhedron::from_box(
                Point3::new(0.0, -0.5 * width, -0.5 * height),
                Vec3::new(*length, *width, *height),
            ),
            Shape::Column { width, depth, height } => Polyhedron::from_box(
                Point3::new(-0.5 * width, -0.5 * depth, 0.0),
                Vec3::new(*width, *depth, *height),
            ),
            Shape::Plate { outline, thickness } => Polyhedron::extrude(outline, *thickness),
        };
        lowered.map_err(|e| match e {
            ModelError::Geometry(msg) => ModelError::Geometry(format!("{}: {msg}", self.kind_name())),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_beam_runs_along_x() {
        let beam = Shape::Beam {
            width: 0.2,
            height: 0.4,
            length: 3.0,
        }
        .to_polyhedron()
        .unwrap();
        if let BoundingVolume::Aabb { min, max } = beam.compute_aabb(0.0).unwrap() {
            assert_relative_eq!(min, Point3::new(0.0, -0.1, -0.2), epsilon = 1e-12);
            assert_relative_eq!(max, Point3::new(3.0, 0.1, 0.2), epsilon = 1e-12);
        } else {
            panic!("expected an axis-aligned box");
        }
    }

    #[test]
    fn test_column_stands_on_origin() {
        let column = Shape::Column {
            width: 0.3,
            depth: 0.5,
            height: 2.5,
        }
        .to_polyhedron()
        .unwrap();
        let centroid = ElementGeometry::centroid(&column).unwrap();
        assert_relative_eq!(centroid, Point3::new(0.0, 0.0, 1.25), epsilon = 1e-12);
    }

    #[test]
    fn test_plate_extrudes_outline() {
        let plate = Shape::Plate {
            outline: vec![
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 1.0),
                Point2::new(1.0, 1.5),
                Point2::new(0.0, 1.0),
            ],
            thickness: 0.1,
        }
        .to_polyhedron()
        .unwrap();
        assert_eq!(plate.faces.len(), 7);
        assert_eq!(ElementGeometry::boundary_polygons(&plate).len(), 7);
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        let flat = Shape::Box {
            xsize: 1.0,
            ysize: 1.0,
            zsize: 0.0,
        };
        match flat.to_polyhedron() {
            Err(ModelError::Geometry(msg)) => assert!(msg.starts_with("box")),
            other => panic!("unexpected result {other:?}"),
        }

        let sliver = Shape::Plate {
            outline: vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)],
            thickness: 1.0,
        };
        assert!(sliver.to_polyhedron().is_err());
    }

    #[test]
    fn test_obb_of_rotated_geometry_is_tight() {
        use crate::foundation::math::Transform;
        let plank = Shape::Box {
            xsize: 4.0,
            ysize: 1.0,
            zsize: 0.25,
        }
        .to_polyhedron()
        .unwrap()
        .transformed(&Transform::from_axis_angle(Vec3::z(), 0.6, Vec3::new(2.0, 1.0, 0.0)));
        if let BoundingVolume::Obb { half_extents, .. } = plank.compute_obb(0.0).unwrap() {
            assert_relative_eq!(half_extents, Vec3::new(2.0, 0.5, 0.125), epsilon = 1e-9);
        } else {
            panic!("expected an oriented box");
        }
    }
}
