//! Face-to-face contact between two solids
//!
//! Faces of the two solids are paired when their normals are opposed and
//! their planes coincide within the linear tolerance. Each such pair is
//! projected into the 2D frame of the first face, tested with the Minkowski
//! difference and clipped to its overlap region.

use crate::config::ContactSettings;
use crate::elements::{ElementGeometry, ElementId};
use crate::error::ModelResult;
use crate::foundation::math::{Frame, Point2, Point3, Vec3, EPSILON};
use crate::geometry::{polygon, principal_axes, Polygon3};
use crate::model::{Contact, ContactKind};

/// Numeric slack added to the linear tolerance so that exactly touching faces qualify at zero tolerance
pub const CONTACT_SLACK: f64 = 1e-6;

/// Overlap of one face pair
#[derive(Debug, Clone)]
struct Region {
    polygon: Polygon3,
    area: f64,
    normal: Vec3,
}

/// Face pair acceptance thresholds derived from [`ContactSettings`]
#[derive(Debug, Clone, Copy)]
pub struct NarrowPhase {
    distance: f64,
    min_cos: f64,
    area_tolerance: f64,
}

impl NarrowPhase {
    /// Thresholds for the given settings
    pub fn new(settings: &ContactSettings) -> Self {
        Self {
            distance: settings.tolerance + CONTACT_SLACK,
            min_cos: settings.angular_tolerance.cos(),
            area_tolerance: settings.area_tolerance,
        }
    }

    /// Check whether two faces are opposed and share their supporting plane
    fn coplanar(&self, fa: &Polygon3, na: &Vec3, fb: &Polygon3, nb: &Vec3) -> bool {
        if na.dot(nb) > -self.min_cos {
            return false;
        }
        let (Some(pa), Some(pb)) = (fa.plane(), fb.plane()) else {
            return false;
        };
        fb.points.iter().all(|p| pa.distance_to_point(p).abs() <= self.distance)
            && fa.points.iter().all(|p| pb.distance_to_point(p).abs() <= self.distance)
    }

    /// Overlap region of a coplanar face pair in model space
    fn overlap(&self, fa: &Polygon3, fb: &Polygon3, normal: Vec3) -> ModelResult<Option<Region>> {
        let Some(frame) = fa.frame() else {
            return Ok(None);
        };
        let a2 = fa.project(&frame);
        let b2 = fb.project(&frame);
        if !polygon::is_collision_poly_poly_xy(&a2, &b2)? {
            return Ok(None);
        }
        let overlap = polygon::overlap_polygon(&a2, &b2)?;
        let area = polygon::area(&overlap);
        if overlap.is_empty() || area < self.area_tolerance {
            return Ok(None);
        }
        let points = overlap
            .iter()
            .map(|p: &Point2| frame.to_world(&Point3::new(p.x, p.y, 0.0)))
            .collect();
        Ok(Some(Region {
            polygon: Polygon3::new(points),
            area,
            normal,
        }))
    }

    /// Contact between two solids given in model space, `None` when they do not touch
    ///
    /// The contact normal points from `a` into `b`. Faces that are not convex
    /// fail with a geometry error once they are found coplanar with a partner.
    pub fn contact<G: ElementGeometry + ?Sized>(
        &self,
        a: ElementId,
        geometry_a: &G,
        b: ElementId,
        geometry_b: &G,
    ) -> ModelResult<Option<Contact>> {
        let faces_a: Vec<(Polygon3, Vec3)> = oriented_faces(geometry_a);
        let faces_b: Vec<(Polygon3, Vec3)> = oriented_faces(geometry_b);

        let mut regions = Vec::new();
        for (fa, na) in &faces_a {
            for (fb, nb) in &faces_b {
                if !self.coplanar(fa, na, fb, nb) {
                    continue;
                }
                if let Some(region) = self.overlap(fa, fb, *na)? {
                    regions.push(region);
                }
            }
        }

        if regions.is_empty() {
            return Ok(None);
        }
        log::trace!("{} and {} touch on {} face pairs", a, b, regions.len());
        Ok(contact_from_regions(a, b, regions))
    }
}

fn oriented_faces<G: ElementGeometry + ?Sized>(geometry: &G) -> Vec<(Polygon3, Vec3)> {
    geometry
        .boundary_polygons()
        .into_iter()
        .filter_map(|face| {
            let normal = face.normal()?;
            Some((face, normal))
        })
        .collect()
}

/// Aggregate regions into one contact with an area-weighted best-fit frame
fn contact_from_regions(a: ElementId, b: ElementId, regions: Vec<Region>) -> Option<Contact> {
    let area: f64 = regions.iter().map(|r| r.area).sum();
    if area <= 0.0 {
        return None;
    }

    let mut normal = Vec3::zeros();
    let mut origin = Vec3::zeros();
    for region in &regions {
        normal += region.normal * region.area;
        origin += region.polygon.centroid()?.coords * region.area;
    }
    let normal = normal.try_normalize(EPSILON).unwrap_or(regions[0].normal);
    let origin = Point3::from(origin / area);

    let points: Vec<Point3> = regions.iter().flat_map(|r| r.polygon.points.iter().copied()).collect();
    let xhint = principal_axes(&points).map_or_else(Vec3::x, |axes| axes.axes[0]);

    Some(Contact {
        a,
        b,
        polygons: regions.into_iter().map(|r| r.polygon).collect(),
        area,
        frame: Frame::from_normal(origin, normal, xhint),
        kind: ContactKind::default(),
    })
}
