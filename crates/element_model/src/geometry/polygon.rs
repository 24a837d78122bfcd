//! Planar polygon operations in a local XY frame
//!
//! Convex polygons are stored counter-clockwise. The collision test builds
//! the Minkowski difference `A ⊕ (-B)` and checks whether it contains the
//! origin; the overlap region is computed by Sutherland-Hodgman clipping.

use crate::error::ModelError;
use crate::foundation::math::{Point2, Vec2};

/// Polygons with a smaller absolute area are degenerate
pub const AREA_EPSILON: f64 = 1e-12;

/// Distance below which two vertices are considered the same
const MERGE_EPSILON: f64 = 1e-12;

/// Slack for on-boundary containment tests
const SIDE_EPSILON: f64 = 1e-9;

fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Signed area (positive for counter-clockwise polygons)
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (p, q) = (points[i], points[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum();
    0.5 * twice
}

/// Absolute area
pub fn area(points: &[Point2]) -> f64 {
    signed_area(points).abs()
}

/// Drop consecutive duplicate vertices, including a closing duplicate
pub fn dedup_vertices(points: &[Point2]) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |q| (p - q).norm() > MERGE_EPSILON) {
            out.push(*p);
        }
    }
    while out.len() > 1 && (out[0] - out[out.len() - 1]).norm() <= MERGE_EPSILON {
        out.pop();
    }
    out
}

/// True when every turn of the polygon has the same orientation
///
/// Collinear vertices are ignored.
pub fn is_convex(points: &[Point2]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let scale = points
        .iter()
        .map(|p| p.coords.amax())
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let eps = 1e-12 * scale * scale;

    let mut sign = 0.0_f64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        let turn = cross(&(b - a), &(c - b));
        if turn.abs() <= eps {
            continue;
        }
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
    }
    sign != 0.0
}

/// Validate a polygon for the convex-only routines and return it counter-clockwise
pub fn convex_polygon(points: &[Point2]) -> Result<Vec<Point2>, ModelError> {
    let mut polygon = dedup_vertices(points);
    if polygon.len() < 3 {
        return Err(ModelError::Geometry(format!(
            "polygon needs at least 3 distinct vertices, got {}",
            polygon.len()
        )));
    }
    let signed = signed_area(&polygon);
    if signed.abs() < AREA_EPSILON {
        return Err(ModelError::Geometry("degenerate polygon with zero area".to_string()));
    }
    if !is_convex(&polygon) {
        return Err(ModelError::Geometry("non-convex polygon passed to a convex-only routine".to_string()));
    }
    if signed < 0.0 {
        polygon.reverse();
    }
    Ok(polygon)
}

/// Index of the vertex with the smallest y, then the smallest x
fn bottom_left(points: &[Point2]) -> usize {
    points
        .iter()
        .enumerate()
        .min_by(|(_, p), (_, q)| {
            p.y.partial_cmp(&q.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(p.x.partial_cmp(&q.x).unwrap_or(std::cmp::Ordering::Equal))
        })
        .map_or(0, |(i, _)| i)
}

fn reorder_bottom_left(points: &[Point2]) -> Vec<Point2> {
    let start = bottom_left(points);
    points[start..].iter().chain(points[..start].iter()).copied().collect()
}

/// Minkowski sum of two counter-clockwise convex polygons
///
/// Edges of both polygons are merged by polar angle starting from their
/// bottom-left vertices, so the result is counter-clockwise as well.
pub fn minkowski_sum(a: &[Point2], b: &[Point2]) -> Vec<Point2> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let a = reorder_bottom_left(a);
    let b = reorder_bottom_left(b);
    let (la, lb) = (a.len(), b.len());

    let mut points = Vec::with_capacity(la + lb);
    let (mut i, mut j) = (0, 0);
    while i < la || j < lb {
        points.push(Point2::from(a[i % la].coords + b[j % lb].coords));
        if i == la {
            j += 1;
            continue;
        }
        if j == lb {
            i += 1;
            continue;
        }
        let edge_a = a[(i + 1) % la] - a[i % la];
        let edge_b = b[(j + 1) % lb] - b[j % lb];
        let turn = cross(&edge_a, &edge_b);
        if turn >= 0.0 {
            i += 1;
        }
        if turn <= 0.0 {
            j += 1;
        }
    }
    points
}

/// Minkowski difference `A ⊕ (-B)` of two counter-clockwise convex polygons
pub fn minkowski_difference(a: &[Point2], b: &[Point2]) -> Vec<Point2> {
    let negated: Vec<Point2> = b.iter().map(|p| Point2::from(-p.coords)).collect();
    minkowski_sum(a, &negated)
}

/// Containment test for a counter-clockwise convex polygon; boundary points count as inside
pub fn contains_point(polygon: &[Point2], point: &Point2) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    (0..n).all(|i| {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let edge = b - a;
        cross(&edge, &(point - a)) >= -SIDE_EPSILON * edge.norm().max(1.0)
    })
}

/// Whether two convex polygons in the XY plane overlap or touch
///
/// The polygons overlap iff the origin lies inside their Minkowski difference.
/// Inputs may be in either orientation; non-convex or degenerate inputs are rejected.
pub fn is_collision_poly_poly_xy(a: &[Point2], b: &[Point2]) -> Result<bool, ModelError> {
    let a = convex_polygon(a)?;
    let b = convex_polygon(b)?;
    let difference = minkowski_difference(&a, &b);
    Ok(contains_point(&difference, &Point2::origin()))
}

/// Clip a convex polygon against a convex clip polygon (both counter-clockwise)
pub fn clip_convex(subject: &[Point2], clip: &[Point2]) -> Vec<Point2> {
    let mut output = subject.to_vec();
    let n = clip.len();
    for i in 0..n {
        if output.is_empty() {
            break;
        }
        let c0 = clip[i];
        let edge = clip[(i + 1) % n] - c0;
        let side = |p: &Point2| cross(&edge, &(p - c0));

        let input = std::mem::take(&mut output);
        let m = input.len();
        for k in 0..m {
            let current = input[k];
            let previous = input[(k + m - 1) % m];
            let (sc, sp) = (side(&current), side(&previous));
            let current_inside = sc >= 0.0;
            let previous_inside = sp >= 0.0;

            if current_inside != previous_inside {
                let t = sp / (sp - sc);
                output.push(previous + (current - previous) * t);
            }
            if current_inside {
                output.push(current);
            }
        }
    }
    dedup_vertices(&output)
}

/// Overlap region of two convex polygons, counter-clockwise
///
/// Returns an empty polygon when the overlap has no area.
pub fn overlap_polygon(a: &[Point2], b: &[Point2]) -> Result<Vec<Point2>, ModelError> {
    let a = convex_polygon(a)?;
    let b = convex_polygon(b)?;
    let clipped = clip_convex(&a, &b);
    if clipped.len() < 3 || area(&clipped) < AREA_EPSILON {
        return Ok(Vec::new());
    }
    Ok(clipped)
}
