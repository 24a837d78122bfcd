//! Math utilities and types
//!
//! Double precision aliases over `nalgebra` plus the rigid [`Transform`],
//! [`Frame`] and [`Plane`] types shared by the geometry and model layers.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f64>;

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f64>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f64>;

/// 2D point type
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f64>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f64>>;

/// Lengths below this are treated as zero when normalizing directions.
pub const EPSILON: f64 = 1e-12;

/// Rigid transformation: a rotation followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation applied after the rotation
    pub translation: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only a translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a transform with only a rotation
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    /// Create a rotation of `angle` radians about `axis`, followed by `translation`
    pub fn from_axis_angle(axis: Vec3, angle: f64, translation: Vec3) -> Self {
        let rotation = Unit::try_new(axis, EPSILON)
            .map_or_else(Quat::identity, |axis| Quat::from_axis_angle(&axis, angle));
        Self { translation, rotation }
    }

    /// Transform mapping frame-local coordinates into the frame's parent space
    pub fn from_frame(frame: &Frame) -> Self {
        let basis = Mat3::from_columns(&[frame.xaxis, frame.yaxis, frame.zaxis]);
        let rotation = Quat::from_rotation_matrix(&nalgebra::Rotation3::from_matrix_unchecked(basis));
        Self {
            translation: frame.origin.coords,
            rotation,
        }
    }

    /// Convert to a homogeneous transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.translation) * self.rotation.to_homogeneous()
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: &Point3) -> Point3 {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    /// Apply this transform to a vector (translation is ignored)
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Compose two transforms: the result applies `other` first, then `self`.
    ///
    /// A chain `root.combine(&child).combine(&grandchild)` therefore maps
    /// grandchild-local coordinates into root space.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            translation: self.translation + self.rotation * other.translation,
            rotation: self.rotation * other.rotation,
        }
    }

    /// Get the inverse transform
    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.inverse();
        Transform {
            translation: -(rotation * self.translation),
            rotation,
        }
    }

    /// Approximate equality within `epsilon` on translation and rotation
    pub fn abs_diff_eq(&self, other: &Transform, epsilon: f64) -> bool {
        (self.translation - other.translation).amax() <= epsilon
            && self.rotation.angle_to(&other.rotation) <= epsilon
    }
}

/// Orthonormal right-handed coordinate frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Origin of the frame
    pub origin: Point3,
    /// Local X axis (unit)
    pub xaxis: Vec3,
    /// Local Y axis (unit)
    pub yaxis: Vec3,
    /// Local Z axis (unit), `xaxis × yaxis`
    pub zaxis: Vec3,
}

impl Frame {
    /// The world XY frame at the origin
    pub fn world_xy() -> Self {
        Self {
            origin: Point3::origin(),
            xaxis: Vec3::x(),
            yaxis: Vec3::y(),
            zaxis: Vec3::z(),
        }
    }

    /// Build a frame from an origin and an X direction hint inside the plane of `normal`.
    ///
    /// Falls back to an arbitrary in-plane X axis when the hint is parallel to the normal.
    pub fn from_normal(origin: Point3, normal: Vec3, xhint: Vec3) -> Self {
        let zaxis = normal.try_normalize(EPSILON).unwrap_or_else(Vec3::z);
        let projected = xhint - zaxis * xhint.dot(&zaxis);
        let xaxis = projected
            .try_normalize(1e-9)
            .unwrap_or_else(|| any_perpendicular(&zaxis));
        let yaxis = zaxis.cross(&xaxis);
        Self { origin, xaxis, yaxis, zaxis }
    }

    /// Express a world point in this frame's coordinates
    pub fn to_local(&self, point: &Point3) -> Point3 {
        let d = point - self.origin;
        Point3::new(d.dot(&self.xaxis), d.dot(&self.yaxis), d.dot(&self.zaxis))
    }

    /// Map a point in this frame's coordinates back to world space
    pub fn to_world(&self, local: &Point3) -> Point3 {
        self.origin + self.xaxis * local.x + self.yaxis * local.y + self.zaxis * local.z
    }

    /// Apply a rigid transform to the frame
    pub fn transformed(&self, transform: &Transform) -> Frame {
        Frame {
            origin: transform.transform_point(&self.origin),
            xaxis: transform.transform_vector(&self.xaxis),
            yaxis: transform.transform_vector(&self.yaxis),
            zaxis: transform.transform_vector(&self.zaxis),
        }
    }
}

/// Plane through `point` with unit `normal`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// A point on the plane
    pub point: Point3,
    /// Unit normal
    pub normal: Vec3,
}

impl Plane {
    /// Create a plane, normalizing the normal
    pub fn new(point: Point3, normal: Vec3) -> Self {
        Self {
            point,
            normal: normal.try_normalize(EPSILON).unwrap_or_else(Vec3::z),
        }
    }

    /// Signed distance from the plane to a point (positive on the normal side)
    pub fn distance_to_point(&self, point: &Point3) -> f64 {
        self.normal.dot(&(point - self.point))
    }

    /// Apply a rigid transform to the plane
    pub fn transformed(&self, transform: &Transform) -> Plane {
        Plane {
            point: transform.transform_point(&self.point),
            normal: transform.transform_vector(&self.normal),
        }
    }
}

/// A unit vector perpendicular to `v`
pub fn any_perpendicular(v: &Vec3) -> Vec3 {
    let helper = if v.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    v.cross(&helper).try_normalize(EPSILON).unwrap_or_else(Vec3::x)
}

/// Average of a set of points, `None` when empty
pub fn centroid(points: &[Point3]) -> Option<Point3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_transform_identity() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(t.transform_point(&p), p);
    }

    #[test]
    fn test_combine_applies_right_operand_first() {
        let rotate = Transform::from_axis_angle(Vec3::z(), FRAC_PI_2, Vec3::zeros());
        let shift = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));

        // shift first, then rotate: (1,0,0) -> (2,0,0) -> (0,2,0)
        let p = rotate.combine(&shift).transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 2.0, 0.0), epsilon = 1e-12);

        // rotate first, then shift: (1,0,0) -> (0,1,0) -> (1,1,0)
        let p = shift.combine(&rotate).transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_transform_validation() {
        let t = Transform::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7, Vec3::new(3.0, -2.0, 5.0));
        let p = Point3::new(0.3, 0.4, -1.2);
        let back = t.inverse().transform_point(&t.transform_point(&p));
        assert_relative_eq!(back, p, epsilon = 1e-12);
        assert!(t.combine(&t.inverse()).abs_diff_eq(&Transform::identity(), 1e-6));
    }

    #[test]
    fn test_frame_roundtrip_and_handedness() {
        let frame = Frame::from_normal(Point3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 1.0, 5.0));
        assert_relative_eq!(frame.xaxis.cross(&frame.yaxis), frame.zaxis, epsilon = 1e-12);
        let p = Point3::new(-4.0, 0.5, 9.0);
        assert_relative_eq!(frame.to_world(&frame.to_local(&p)), p, epsilon = 1e-12);

        let t = Transform::from_frame(&frame);
        assert_relative_eq!(t.transform_point(&frame.to_local(&p)), p, epsilon = 1e-12);
    }

    #[test]
    fn test_plane_signed_distance() {
        let plane = Plane::new(Point3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(plane.distance_to_point(&Point3::new(5.0, 5.0, 3.0)), 2.0);
        assert_relative_eq!(plane.distance_to_point(&Point3::new(5.0, 5.0, 0.0)), -1.0);
    }
}
