//! Interaction payloads carried by graph edges

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::elements::ElementId;
use crate::foundation::math::{Frame, Plane, Vec3};
use crate::geometry::Polygon3;

/// Mechanical behaviour assumed for a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContactKind {
    /// Compression-only, non-deformable
    #[default]
    Hard,
    /// Deformable
    Soft,
    /// Transfers tension as well as compression
    Sticky,
}

/// Face-to-face contact between two elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Element whose faces define the contact plane
    pub a: ElementId,

    /// The other element
    pub b: ElementId,

    /// Overlap regions in model space, one per touching face pair
    pub polygons: Vec<Polygon3>,

    /// Total area of all regions
    pub area: f64,

    /// Best-fit frame of the touching faces; Z points from `a` into `b`
    pub frame: Frame,

    /// Contact behaviour
    #[serde(default)]
    pub kind: ContactKind,
}

impl Contact {
    /// Unit normal pointing from `a` into `b`
    pub fn normal(&self) -> Vec3 {
        self.frame.zaxis
    }

    /// Number of disjoint regions
    pub fn region_count(&self) -> usize {
        self.polygons.len()
    }
}

/// Effect of one element on the geometry of another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Modifier {
    /// Cut the target with a plane attached to the source
    Slice {
        /// Element carrying the plane
        source: ElementId,
        /// Plane in the source's local frame; the target keeps the side behind the normal
        plane: Plane,
    },
}

impl Modifier {
    /// Element the modifier is attached to
    pub fn source(&self) -> ElementId {
        match self {
            Modifier::Slice { source, .. } => *source,
        }
    }
}

/// Payload on an interaction graph edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Interaction {
    /// Contact computed by the detector
    Contact(Contact),
    /// Geometry modifier between the endpoints
    Modifier(Modifier),
    /// Manually declared relation
    Generic {
        /// Label
        name: String,
        /// Free-form value
        value: String,
    },
}

/// Discriminant of [`Interaction`], used to filter edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    /// [`Interaction::Contact`]
    Contact,
    /// [`Interaction::Modifier`]
    Modifier,
    /// [`Interaction::Generic`]
    Generic,
}

impl Interaction {
    /// Kind of this interaction
    pub fn kind(&self) -> InteractionKind {
        match self {
            Interaction::Contact(_) => InteractionKind::Contact,
            Interaction::Modifier(_) => InteractionKind::Modifier,
            Interaction::Generic { .. } => InteractionKind::Generic,
        }
    }

    /// Generic interaction with a label and value
    pub fn generic(name: impl Into<String>, value: impl Into<String>) -> Self {
        Interaction::Generic {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interaction::Contact(contact) => write!(
                f,
                "contact {:?} {} -> {} (area {:.6}, {} regions)",
                contact.kind,
                contact.a,
                contact.b,
                contact.area,
                contact.region_count()
            ),
            Interaction::Modifier(Modifier::Slice { source, .. }) => write!(f, "slice from {source}"),
            Interaction::Generic { name, value } => write!(f, "{name}: {value}"),
        }
    }
}
