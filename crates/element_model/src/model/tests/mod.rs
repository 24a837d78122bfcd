//! Model-level tests spanning the tree, the graph, the caches and contact detection

mod contacts;
mod lifecycle;

use crate::elements::{Element, ElementId, Shape};
use crate::foundation::math::{Transform, Vec3};

fn cube(id: u64, x: f64, y: f64, z: f64) -> Element {
    Element::new(
        ElementId(id),
        format!("cube{id}"),
        Shape::Box {
            xsize: 1.0,
            ysize: 1.0,
            zsize: 1.0,
        },
    )
    .unwrap()
    .with_transformation(Transform::from_translation(Vec3::new(x, y, z)))
}
