//! Elements and their model-space caches
//!
//! An element owns its local geometry and its transformation relative to the
//! parent tree node. Model-space values are cached together with the epoch
//! they were computed at. The model bumps two epochs independently:
//! `transform_epoch` when the element or an ancestor moves, and
//! `geometry_epoch` when something a neighbour contributes to the geometry
//! changes. A cache is stale once its epoch is older than the relevant one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::foundation::math::{Point3, Transform};
use crate::geometry::{Polygon3, Polyhedron};

use super::shape::{ElementGeometry, Shape};

/// Stable unique identifier of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    epoch: u64,
}

/// A discrete solid part of a model
#[derive(Debug, Clone)]
pub struct Element {
    id: ElementId,
    name: String,
    shape: Shape,
    geometry: Polyhedron,
    transformation: Transform,
    is_support: bool,

    transform_epoch: u64,
    geometry_epoch: u64,
    model_transformation: Option<Cached<Transform>>,
    model_geometry: Option<Cached<Polyhedron>>,
}

impl Element {
    /// Create an element with an identity local transformation
    ///
    /// Fails with a geometry error when the shape does not describe a closed solid.
    pub fn new(id: ElementId, name: impl Into<String>, shape: Shape) -> ModelResult<Self> {
        let geometry = shape.to_polyhedron()?;
        Ok(Self {
            id,
            name: name.into(),
            shape,
            geometry,
            transformation: Transform::identity(),
            is_support: false,
            transform_epoch: 0,
            geometry_epoch: 0,
            model_transformation: None,
            model_geometry: None,
        })
    }

    /// Builder-style local transformation
    pub fn with_transformation(mut self, transformation: Transform) -> Self {
        self.transformation = transformation;
        self
    }

    /// Builder-style support flag
    pub fn with_support(mut self, is_support: bool) -> Self {
        self.is_support = is_support;
        self
    }

    /// Element identifier
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Element name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the element
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Whether the element is a fixed support
    pub fn is_support(&self) -> bool {
        self.is_support
    }

    /// Mark the element as a fixed support
    pub fn set_support(&mut self, is_support: bool) {
        self.is_support = is_support;
    }

    /// Shape the local geometry was built from
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Local geometry
    pub fn geometry(&self) -> &Polyhedron {
        &self.geometry
    }

    /// Element-to-parent transformation
    pub fn transformation(&self) -> &Transform {
        &self.transformation
    }

    /// Cached element-to-model transformation, `None` while stale
    pub fn model_transformation(&self) -> Option<&Transform> {
        if self.is_transform_dirty() {
            return None;
        }
        self.model_transformation.as_ref().map(|c| &c.value)
    }

    /// Cached model-space geometry, `None` while stale
    pub fn model_geometry(&self) -> Option<&Polyhedron> {
        if self.is_geometry_dirty() {
            return None;
        }
        self.model_geometry.as_ref().map(|c| &c.value)
    }

    /// The cached model transformation needs recomputing
    pub fn is_transform_dirty(&self) -> bool {
        self.model_transformation
            .as_ref()
            .map_or(true, |c| c.epoch < self.transform_epoch)
    }

    /// The cached model geometry needs recomputing
    ///
    /// True after a transform change of the element itself, and after a
    /// change of a neighbour that contributes to the geometry.
    pub fn is_geometry_dirty(&self) -> bool {
        self.model_geometry
            .as_ref()
            .map_or(true, |c| c.epoch < self.transform_epoch.max(self.geometry_epoch))
    }

    pub(crate) fn set_transformation(&mut self, transformation: Transform, epoch: u64) {
        self.transformation = transformation;
        self.invalidate_transform(epoch);
    }

    pub(crate) fn set_shape(&mut self, shape: Shape, epoch: u64) -> ModelResult<()> {
        self.geometry = shape.to_polyhedron()?;
        self.shape = shape;
        self.invalidate_geometry(epoch);
        Ok(())
    }

    pub(crate) fn invalidate_transform(&mut self, epoch: u64) {
        self.transform_epoch = self.transform_epoch.max(epoch);
    }

    pub(crate) fn invalidate_geometry(&mut self, epoch: u64) {
        self.geometry_epoch = self.geometry_epoch.max(epoch);
    }

    pub(crate) fn store_model_transformation(&mut self, value: Transform, epoch: u64) {
        self.model_transformation = Some(Cached { value, epoch });
    }

    pub(crate) fn store_model_geometry(&mut self, value: Polyhedron, epoch: u64) {
        self.model_geometry = Some(Cached { value, epoch });
    }
}

impl ElementGeometry for Element {
    fn points(&self) -> Vec<Point3> {
        self.geometry.points()
    }

    fn centroid(&self) -> Option<Point3> {
        self.geometry.centroid()
    }

    fn boundary_polygons(&self) -> Vec<Polygon3> {
        self.geometry.boundary_polygons()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn cube(id: u64) -> Element {
        Element::new(
            ElementId(id),
            format!("cube {id}"),
            Shape::Box {
                xsize: 1.0,
                ysize: 1.0,
                zsize: 1.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_new_element_is_dirty() {
        let element = cube(1);
        assert!(element.is_transform_dirty());
        assert!(element.is_geometry_dirty());
        assert!(element.model_transformation().is_none());
    }

    #[test]
    fn test_epochs_gate_cached_values() {
        let mut element = cube(1);
        element.store_model_transformation(Transform::identity(), 1);
        element.store_model_geometry(element.geometry().clone(), 1);
        assert!(!element.is_transform_dirty());
        assert!(!element.is_geometry_dirty());

        element.invalidate_geometry(2);
        assert!(!element.is_transform_dirty());
        assert!(element.is_geometry_dirty());
        assert!(element.model_geometry().is_none());
        assert!(element.model_transformation().is_some());

        element.store_model_geometry(element.geometry().clone(), 2);
        element.set_transformation(Transform::from_translation(Vec3::x()), 3);
        assert!(element.is_transform_dirty());
        assert!(element.is_geometry_dirty());
    }

    #[test]
    fn test_invalid_shape_is_rejected() {
        let result = Element::new(
            ElementId(9),
            "bad",
            Shape::Beam {
                width: -1.0,
                height: 1.0,
                length: 1.0,
            },
        );
        assert!(result.is_err());
    }
}
