//! Elements: identity, shape, local transformation and model-space caches

mod element;
mod shape;

pub use element::{Element, ElementId};
pub use shape::{ElementGeometry, Shape};
