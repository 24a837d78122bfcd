//! Closed planar-faced solids and their boundary polygons

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::foundation::math::{centroid, Frame, Plane, Point2, Point3, Transform, Vec3, EPSILON};
use crate::geometry::polygon;

/// Vertices closer than this are merged when a solid is rebuilt
const WELD_EPSILON: f64 = 1e-9;

/// Planar polygon in 3D, ordered counter-clockwise around its normal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon3 {
    /// Polygon vertices
    pub points: Vec<Point3>,
}

impl Polygon3 {
    /// Create a polygon from its vertices
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    /// Area-weighted normal computed with Newell's method (length = 2 * area)
    fn newell(&self) -> Vec3 {
        let n = self.points.len();
        let mut normal = Vec3::zeros();
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            normal.x += (p.y - q.y) * (p.z + q.z);
            normal.y += (p.z - q.z) * (p.x + q.x);
            normal.z += (p.x - q.x) * (p.y + q.y);
        }
        normal
    }

    /// Unit normal, `None` for a degenerate polygon
    pub fn normal(&self) -> Option<Vec3> {
        self.newell().try_normalize(EPSILON)
    }

    /// Polygon area
    pub fn area(&self) -> f64 {
        0.5 * self.newell().norm()
    }

    /// Vertex average
    pub fn centroid(&self) -> Option<Point3> {
        centroid(&self.points)
    }

    /// Supporting plane through the vertex average
    pub fn plane(&self) -> Option<Plane> {
        Some(Plane::new(self.centroid()?, self.normal()?))
    }

    /// Frame on the supporting plane with Z along the normal and X along the first edge
    pub fn frame(&self) -> Option<Frame> {
        let origin = self.centroid()?;
        let normal = self.normal()?;
        let xhint = if self.points.len() > 1 {
            self.points[1] - self.points[0]
        } else {
            Vec3::x()
        };
        Some(Frame::from_normal(origin, normal, xhint))
    }

    /// Coordinates of the vertices in the XY plane of `frame`
    pub fn project(&self, frame: &Frame) -> Vec<Point2> {
        self.points
            .iter()
            .map(|p| {
                let local = frame.to_local(p);
                Point2::new(local.x, local.y)
            })
            .collect()
    }
}

/// Closed solid bounded by planar faces
///
/// Faces are vertex index loops ordered counter-clockwise when seen from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyhedron {
    /// Vertex positions
    pub vertices: Vec<Point3>,
    /// Faces as index loops into `vertices`
    pub faces: Vec<Vec<usize>>,
}

impl Polyhedron {
    /// Create a validated polyhedron
    pub fn new(vertices: Vec<Point3>, faces: Vec<Vec<usize>>) -> ModelResult<Self> {
        let polyhedron = Self { vertices, faces };
        polyhedron.validate()?;
        Ok(polyhedron)
    }

    /// Check vertex and face counts and face indices
    pub fn validate(&self) -> ModelResult<()> {
        if self.vertices.len() < 4 {
            return Err(ModelError::Geometry(format!(
                "polyhedron needs at least 4 vertices, got {}",
                self.vertices.len()
            )));
        }
        if self.faces.len() < 4 {
            return Err(ModelError::Geometry(format!(
                "polyhedron needs at least 4 faces, got {}",
                self.faces.len()
            )));
        }
        for (i, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(ModelError::Geometry(format!("face {i} has fewer than 3 vertices")));
            }
            if let Some(&bad) = face.iter().find(|&&v| v >= self.vertices.len()) {
                return Err(ModelError::Geometry(format!("face {i} references missing vertex {bad}")));
            }
        }
        Ok(())
    }

    /// Axis-aligned box with its minimum corner at `min`
    pub fn from_box(min: Point3, size: Vec3) -> ModelResult<Self> {
        if size.iter().any(|s| !(*s > 0.0)) {
            return Err(ModelError::Geometry(format!(
                "box dimensions must be positive, got {} x {} x {}",
                size.x, size.y, size.z
            )));
        }
        let (x0, y0, z0) = (min.x, min.y, min.z);
        let (x1, y1, z1) = (min.x + size.x, min.y + size.y, min.z + size.z);
        let vertices = vec![
            Point3::new(x0, y0, z0),
            Point3::new(x1, y0, z0),
            Point3::new(x1, y1, z0),
            Point3::new(x0, y1, z0),
            Point3::new(x0, y0, z1),
            Point3::new(x1, y0, z1),
            Point3::new(x1, y1, z1),
            Point3::new(x0, y1, z1),
        ];
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![2, 3, 7, 6],
            vec![0, 4, 7, 3],
            vec![1, 2, 6, 5],
        ];
        Self::new(vertices, faces)
    }

    /// Prism obtained by extruding an XY outline from z = 0 to z = `height`
    pub fn extrude(outline: &[Point2], height: f64) -> ModelResult<Self> {
        if !(height > 0.0) {
            return Err(ModelError::Geometry(format!("extrusion height must be positive, got {height}")));
        }
        let mut outline = polygon::dedup_vertices(outline);
        if outline.len() < 3 {
            return Err(ModelError::Geometry("outline needs at least 3 distinct vertices".to_string()));
        }
        let signed = polygon::signed_area(&outline);
        if signed.abs() < polygon::AREA_EPSILON {
            return Err(ModelError::Geometry("outline has zero area".to_string()));
        }
        if signed < 0.0 {
            outline.reverse();
        }

        let n = outline.len();
        let mut vertices: Vec<Point3> = outline.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
        vertices.extend(outline.iter().map(|p| Point3::new(p.x, p.y, height)));

        let mut faces = Vec::with_capacity(n + 2);
        faces.push((0..n).rev().collect());
        faces.push((n..2 * n).collect());
        for i in 0..n {
            let j = (i + 1) % n;
            faces.push(vec![i, j, n + j, n + i]);
        }
        Self::new(vertices, faces)
    }

    /// Copy with every vertex mapped through `transform`
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            vertices: self.vertices.iter().map(|p| transform.transform_point(p)).collect(),
            faces: self.faces.clone(),
        }
    }

    /// Vertex average
    pub fn centroid(&self) -> Option<Point3> {
        centroid(&self.vertices)
    }

    /// Face loops resolved to polygons
    pub fn boundary_polygons(&self) -> Vec<Polygon3> {
        self.faces
            .iter()
            .map(|face| Polygon3::new(face.iter().map(|&i| self.vertices[i]).collect()))
            .collect()
    }

    /// Keep the part of the solid behind `plane` (signed distance <= 0)
    ///
    /// The cut is closed with a cap face on the plane. Fails when nothing
    /// of the solid remains.
    pub fn slice(&self, plane: &Plane) -> ModelResult<Self> {
        let mut mesh = WeldedMesh::default();
        let mut cap: Vec<Point3> = Vec::new();
        let mut face_on_plane = false;

        for polygon in self.boundary_polygons() {
            let kept = clip_by_plane(&polygon.points, plane, &mut cap);
            if kept.len() < 3 {
                continue;
            }
            if kept.iter().all(|p| plane.distance_to_point(p).abs() <= WELD_EPSILON) {
                face_on_plane = true;
            }
            mesh.add_face(&kept);
        }

        if !face_on_plane {
            if let Some(loop_points) = cap_loop(&cap, plane) {
                mesh.add_face(&loop_points);
            }
        }

        if mesh.faces.is_empty() {
            return Err(ModelError::Geometry("slice plane removes the whole solid".to_string()));
        }
        Self::new(mesh.vertices, mesh.faces)
    }
}

/// Keep the part of a face loop behind the plane, recording points on the cut
fn clip_by_plane(points: &[Point3], plane: &Plane, cut: &mut Vec<Point3>) -> Vec<Point3> {
    let n = points.len();
    let mut out = Vec::with_capacity(n + 2);
    for k in 0..n {
        let current = points[k];
        let previous = points[(k + n - 1) % n];
        let dc = plane.distance_to_point(&current);
        let dp = plane.distance_to_point(&previous);
        let current_inside = dc <= WELD_EPSILON;
        let previous_inside = dp <= WELD_EPSILON;

        if current_inside != previous_inside {
            let t = dp / (dp - dc);
            let crossing = previous + (current - previous) * t;
            out.push(crossing);
            cut.push(crossing);
        }
        if current_inside {
            if dc.abs() <= WELD_EPSILON {
                cut.push(current);
            }
            out.push(current);
        }
    }
    out
}

/// Order cut points counter-clockwise around the plane normal
fn cap_loop(cut: &[Point3], plane: &Plane) -> Option<Vec<Point3>> {
    let mut unique: Vec<Point3> = Vec::new();
    for p in cut {
        if unique.iter().all(|q| (p - q).norm() > WELD_EPSILON) {
            unique.push(*p);
        }
    }
    if unique.len() < 3 {
        return None;
    }
    let center = centroid(&unique)?;
    let frame = Frame::from_normal(center, plane.normal, unique[0] - center);
    let angle = |p: &Point3| {
        let local = frame.to_local(p);
        local.y.atan2(local.x)
    };
    unique.sort_by(|a, b| angle(a).partial_cmp(&angle(b)).unwrap_or(Ordering::Equal));
    (Polygon3::new(unique.clone()).area() > polygon::AREA_EPSILON).then_some(unique)
}

#[derive(Default)]
struct WeldedMesh {
    vertices: Vec<Point3>,
    faces: Vec<Vec<usize>>,
}

impl WeldedMesh {
    fn index_of(&mut self, point: &Point3) -> usize {
        if let Some(i) = self.vertices.iter().position(|q| (point - q).norm() <= WELD_EPSILON) {
            return i;
        }
        self.vertices.push(*point);
        self.vertices.len() - 1
    }

    fn add_face(&mut self, points: &[Point3]) {
        let mut face: Vec<usize> = Vec::with_capacity(points.len());
        for p in points {
            let i = self.index_of(p);
            if face.last() != Some(&i) {
                face.push(i);
            }
        }
        while face.len() > 1 && face.first() == face.last() {
            face.pop();
        }
        if face.len() >= 3 {
            self.faces.push(face);
        }
    }
}
