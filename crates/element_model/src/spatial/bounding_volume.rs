//! Axis-aligned and oriented bounding boxes
//!
//! Both kinds share one [`BoundingVolume`] type so hierarchies can be built
//! over either. Mixed-kind tests treat the AABB as an OBB with world axes.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::foundation::math::{Point3, Vec3, EPSILON};
use crate::geometry::principal_axes;

/// Slack on oriented containment tests
const CONTAINS_EPSILON: f64 = 1e-9;

/// Kind of bounding volume stored in a hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeKind {
    /// Axis-aligned box
    Aabb,
    /// Oriented box fitted with principal components
    Obb,
}

/// A ray for ray casting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin of the ray
    pub origin: Point3,
    /// Direction of the ray; hit distances are measured in multiples of it
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get the point at parameter `t`
    pub fn point_at(&self, t: f64) -> Point3 {
        self.origin + self.direction * t
    }
}

/// Finite line segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Start point
    pub start: Point3,
    /// End point
    pub end: Point3,
}

impl Segment {
    /// Create a segment between two points
    pub fn new(start: Point3, end: Point3) -> Self {
        Self { start, end }
    }

    /// The segment as a ray whose parameter runs from 0 at `start` to 1 at `end`
    pub fn as_ray(&self) -> Ray {
        Ray::new(self.start, self.end - self.start)
    }
}

/// Axis-aligned or oriented box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundingVolume {
    /// Axis-aligned box, `min <= max` componentwise
    Aabb {
        /// Minimum corner
        min: Point3,
        /// Maximum corner
        max: Point3,
    },
    /// Oriented box with orthonormal right-handed axes
    Obb {
        /// Box center
        center: Point3,
        /// Local axes
        axes: [Vec3; 3],
        /// Non-negative half size along each axis
        half_extents: Vec3,
    },
}

impl BoundingVolume {
    /// Fit a volume of the given kind around `points`, grown by `inflate` on every side
    pub fn from_points(kind: VolumeKind, points: &[Point3], inflate: f64) -> ModelResult<Self> {
        if points.is_empty() {
            return Err(ModelError::Geometry(
                "cannot build a bounding volume from zero points".to_string(),
            ));
        }
        let volume = match kind {
            VolumeKind::Aabb => {
                let mut min = points[0];
                let mut max = points[0];
                for p in &points[1..] {
                    min = min.inf(p);
                    max = max.sup(p);
                }
                Self::Aabb { min, max }
            }
            VolumeKind::Obb => {
                let pca = principal_axes(points).ok_or_else(|| {
                    ModelError::Geometry("principal axes of an empty point set".to_string())
                })?;
                let mut lo = Vec3::repeat(f64::INFINITY);
                let mut hi = Vec3::repeat(f64::NEG_INFINITY);
                for p in points {
                    let d = p - pca.mean;
                    for (i, axis) in pca.axes.iter().enumerate() {
                        let s = d.dot(axis);
                        lo[i] = lo[i].min(s);
                        hi[i] = hi[i].max(s);
                    }
                }
                let mid = (lo + hi) * 0.5;
                let center = pca.mean
                    + pca.axes[0] * mid.x
                    + pca.axes[1] * mid.y
                    + pca.axes[2] * mid.z;
                Self::Obb {
                    center,
                    axes: pca.axes,
                    half_extents: (hi - lo) * 0.5,
                }
            }
        };
        Ok(volume.inflated(inflate))
    }

    /// Smallest volume of the given kind fitted around the corners of all `volumes`
    pub fn enclosing(kind: VolumeKind, volumes: &[BoundingVolume]) -> ModelResult<Self> {
        let corners: Vec<Point3> = volumes.iter().flat_map(BoundingVolume::corners).collect();
        Self::from_points(kind, &corners, 0.0)
    }

    /// Kind of this volume
    pub fn kind(&self) -> VolumeKind {
        match self {
            Self::Aabb { .. } => VolumeKind::Aabb,
            Self::Obb { .. } => VolumeKind::Obb,
        }
    }

    /// Copy grown by `margin` on every side
    pub fn inflated(&self, margin: f64) -> Self {
        let margin = margin.max(0.0);
        match *self {
            Self::Aabb { min, max } => Self::Aabb {
                min: min - Vec3::repeat(margin),
                max: max + Vec3::repeat(margin),
            },
            Self::Obb { center, axes, half_extents } => Self::Obb {
                center,
                axes,
                half_extents: half_extents.add_scalar(margin),
            },
        }
    }

    /// Get the center of the volume
    pub fn center(&self) -> Point3 {
        match *self {
            Self::Aabb { min, max } => nalgebra::center(&min, &max),
            Self::Obb { center, .. } => center,
        }
    }

    /// Center, axes and half extents, treating an AABB as an OBB with world axes
    fn oriented(&self) -> (Point3, [Vec3; 3], Vec3) {
        match *self {
            Self::Aabb { min, max } => (
                nalgebra::center(&min, &max),
                [Vec3::x(), Vec3::y(), Vec3::z()],
                (max - min) * 0.5,
            ),
            Self::Obb { center, axes, half_extents } => (center, axes, half_extents),
        }
    }

    /// The eight box corners
    pub fn corners(&self) -> Vec<Point3> {
        let (center, axes, h) = self.oriented();
        let mut corners = Vec::with_capacity(8);
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    corners.push(center + axes[0] * (sx * h.x) + axes[1] * (sy * h.y) + axes[2] * (sz * h.z));
                }
            }
        }
        corners
    }

    /// Check if this volume contains a point (boundary included)
    pub fn contains_point(&self, point: &Point3) -> bool {
        match *self {
            Self::Aabb { min, max } => {
                point.x >= min.x && point.x <= max.x
                    && point.y >= min.y && point.y <= max.y
                    && point.z >= min.z && point.z <= max.z
            }
            Self::Obb { center, axes, half_extents } => {
                let d = point - center;
                (0..3).all(|i| d.dot(&axes[i]).abs() <= half_extents[i] + CONTAINS_EPSILON)
            }
        }
    }

    /// Volume enclosing both operands
    ///
    /// Two AABBs give an AABB; any OBB operand gives an OBB fitted to all corners.
    pub fn union(&self, other: &BoundingVolume) -> BoundingVolume {
        match (*self, *other) {
            (Self::Aabb { min: a0, max: a1 }, Self::Aabb { min: b0, max: b1 }) => Self::Aabb {
                min: a0.inf(&b0),
                max: a1.sup(&b1),
            },
            _ => {
                let mut corners = self.corners();
                corners.extend(other.corners());
                // 16 corners are never empty
                Self::from_points(VolumeKind::Obb, &corners, 0.0).unwrap_or(*self)
            }
        }
    }

    /// Check if this volume intersects another (touching counts)
    ///
    /// AABB pairs compare intervals; anything involving an OBB runs the
    /// separating-axis test over the 15 candidate axes.
    pub fn intersects(&self, other: &BoundingVolume) -> bool {
        if let (Self::Aabb { min: a0, max: a1 }, Self::Aabb { min: b0, max: b1 }) = (*self, *other) {
            return a0.x <= b1.x && a1.x >= b0.x
                && a0.y <= b1.y && a1.y >= b0.y
                && a0.z <= b1.z && a1.z >= b0.z;
        }

        let a = self.oriented();
        let b = other.oriented();

        // Projection interval of a box onto an axis
        fn project(boxed: &(Point3, [Vec3; 3], Vec3), axis: &Vec3) -> (f64, f64) {
            let (center, axes, h) = boxed;
            let c = center.coords.dot(axis);
            let r = h.x * axes[0].dot(axis).abs() + h.y * axes[1].dot(axis).abs() + h.z * axes[2].dot(axis).abs();
            (c - r, c + r)
        }

        // Returns false if the axis separates the boxes
        let test_axis = |axis: Vec3| -> bool {
            let len_sq = axis.norm_squared();
            if len_sq < EPSILON {
                return true; // parallel edges, skip
            }
            let axis = axis / len_sq.sqrt();
            let (min1, max1) = project(&a, &axis);
            let (min2, max2) = project(&b, &axis);
            max1 + EPSILON >= min2 && max2 + EPSILON >= min1
        };

        if !a.1.iter().all(|axis| test_axis(*axis)) {
            return false;
        }
        if !b.1.iter().all(|axis| test_axis(*axis)) {
            return false;
        }
        for ea in &a.1 {
            for eb in &b.1 {
                if !test_axis(ea.cross(eb)) {
                    return false;
                }
            }
        }
        true
    }

    /// Point of the volume closest to `point`; the point itself when inside
    pub fn closest_point(&self, point: &Point3) -> Point3 {
        let (center, axes, h) = self.oriented();
        let d = point - center;
        let mut closest = center;
        for i in 0..3 {
            closest += axes[i] * d.dot(&axes[i]).clamp(-h[i], h[i]);
        }
        closest
    }

    /// Euclidean distance from `point` to the volume, zero inside
    pub fn distance_to_point(&self, point: &Point3) -> f64 {
        (point - self.closest_point(point)).norm()
    }

    /// Check if a sphere overlaps this volume (touching counts)
    pub fn intersects_sphere(&self, center: &Point3, radius: f64) -> bool {
        self.distance_to_point(center) <= radius.max(0.0) + EPSILON
    }

    /// Parameter interval of a ray clipped to the box slabs, within `[t_min, t_max]`
    fn slab_interval(&self, ray: &Ray, mut t_min: f64, mut t_max: f64) -> Option<(f64, f64)> {
        let (center, axes, h) = self.oriented();
        let offset = ray.origin - center;
        for i in 0..3 {
            let origin = offset.dot(&axes[i]);
            let direction = ray.direction.dot(&axes[i]);
            if direction.abs() < EPSILON {
                if origin < -h[i] || origin > h[i] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction;
            let mut t1 = (-h[i] - origin) * inv;
            let mut t2 = (h[i] - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, t_max))
    }

    /// Test ray intersection using the slab method
    ///
    /// Returns the entry parameter (0 when the origin is inside), `None` on a miss.
    pub fn ray_entry(&self, ray: &Ray) -> Option<f64> {
        self.slab_interval(ray, 0.0, f64::INFINITY).map(|(t, _)| t)
    }

    /// Points where a ray enters and leaves the volume
    ///
    /// Empty on a miss, a single point when the ray only grazes an edge or a
    /// corner. A ray starting inside enters at its origin.
    pub fn ray_intersections(&self, ray: &Ray) -> Vec<Point3> {
        self.clipped_points(ray, 0.0, f64::INFINITY)
    }

    /// Points where the infinite line through the ray crosses the volume,
    /// ordered along the ray direction
    pub fn line_intersections(&self, line: &Ray) -> Vec<Point3> {
        self.clipped_points(line, f64::NEG_INFINITY, f64::INFINITY)
    }

    fn clipped_points(&self, ray: &Ray, t_min: f64, t_max: f64) -> Vec<Point3> {
        if ray.direction.norm_squared() < EPSILON {
            return if self.contains_point(&ray.origin) { vec![ray.origin] } else { Vec::new() };
        }
        match self.slab_interval(ray, t_min, t_max) {
            None => Vec::new(),
            Some((t0, t1)) if t1 - t0 <= EPSILON => vec![ray.point_at(t0)],
            Some((t0, t1)) => vec![ray.point_at(t0), ray.point_at(t1)],
        }
    }

    /// Check if a ray hits this volume
    pub fn intersects_ray(&self, ray: &Ray) -> bool {
        self.ray_entry(ray).is_some()
    }

    /// Check if the infinite line through the ray hits this volume
    pub fn intersects_line(&self, line: &Ray) -> bool {
        self.slab_interval(line, f64::NEG_INFINITY, f64::INFINITY).is_some()
    }

    /// First point of the segment inside the volume, `None` on a miss
    pub fn segment_entry(&self, segment: &Segment) -> Option<Point3> {
        let ray = segment.as_ray();
        self.slab_interval(&ray, 0.0, 1.0).map(|(t, _)| ray.point_at(t))
    }

    /// Check if a segment hits this volume
    pub fn intersects_segment(&self, segment: &Segment) -> bool {
        self.segment_entry(segment).is_some()
    }
}
