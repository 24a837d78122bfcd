//! Contact detection through the model

use approx::assert_relative_eq;

use super::cube;
use crate::config::ContactSettings;
use crate::elements::{Element, ElementId, Shape};
use crate::error::ModelError;
use crate::foundation::math::{Plane, Point2, Point3, Transform, Vec3};
use crate::model::{ContactKind, Interaction, InteractionKind, Model, Modifier};

fn stacked() -> Model {
    let mut model = Model::default();
    model.add_element(cube(1, 0.0, 0.0, 0.0), None).unwrap();
    model.add_element(cube(2, 0.0, 0.0, 1.0), None).unwrap();
    model
}

fn l_plate(id: u64) -> Element {
    let outline = vec![
        Point2::new(0.0, 0.0),
        Point2::new(2.0, 0.0),
        Point2::new(2.0, 1.0),
        Point2::new(1.0, 1.0),
        Point2::new(1.0, 2.0),
        Point2::new(0.0, 2.0),
    ];
    Element::new(
        ElementId(id),
        "plate",
        Shape::Plate {
            outline,
            thickness: 0.2,
        },
    )
    .unwrap()
}

#[test]
fn test_stacked_cubes_produce_one_contact() {
    let mut model = stacked();
    let report = model.compute_contacts(&ContactSettings::with_tolerance(0.0)).unwrap();

    assert_eq!(report.added, 1);
    assert_eq!(model.graph().edge_count(), 1);
    let contact = model.contacts().next().unwrap();
    assert_eq!((contact.a, contact.b), (ElementId(1), ElementId(2)));
    assert_relative_eq!(contact.area, 1.0, epsilon = 1e-9);
    assert_relative_eq!(contact.normal(), Vec3::z(), epsilon = 1e-9);
}

#[test]
fn test_gap_produces_no_contact() {
    for tolerance in [0.0, 0.1] {
        let mut model = Model::default();
        model.add_element(cube(1, 0.0, 0.0, 0.0), None).unwrap();
        model.add_element(cube(2, 1.5, 0.0, 0.0), None).unwrap();
        let report = model.compute_contacts(&ContactSettings::with_tolerance(tolerance)).unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(model.graph().edge_count(), 0);
    }
}

#[test]
fn test_second_pass_updates_in_place() {
    let mut model = stacked();
    let settings = ContactSettings::default();
    model.compute_contacts(&settings).unwrap();
    let report = model.compute_contacts(&settings).unwrap();
    assert_eq!((report.added, report.updated, report.removed), (0, 1, 0));
    assert_eq!(model.graph().edge_count(), 1);
}

#[test]
fn test_stale_contact_is_removed_after_move() {
    let mut model = stacked();
    let settings = ContactSettings::default();
    model.compute_contacts(&settings).unwrap();

    model
        .set_transformation(ElementId(2), Transform::from_translation(Vec3::new(0.0, 0.0, 5.0)))
        .unwrap();
    let report = model.compute_contacts(&settings).unwrap();
    assert_eq!(report.removed, 1);
    assert!(!model.has_interaction(ElementId(1), ElementId(2)));
}

#[test]
fn test_removed_contact_keeps_other_interactions() {
    let mut model = stacked();
    let settings = ContactSettings::default();
    model.compute_contacts(&settings).unwrap();
    model
        .add_interaction(ElementId(1), ElementId(2), Some(Interaction::generic("mortar", "lime")))
        .unwrap();

    model
        .set_transformation(ElementId(2), Transform::from_translation(Vec3::new(3.0, 0.0, 0.0)))
        .unwrap();
    model.compute_contacts(&settings).unwrap();
    let edge = model.graph().edge(ElementId(1), ElementId(2)).unwrap();
    assert!(edge.contact().is_none());
    assert!(edge.has_kind(InteractionKind::Generic));
}

#[test]
fn test_contact_kind_survives_recomputation() {
    let mut model = stacked();
    let settings = ContactSettings::default();
    model.compute_contacts(&settings).unwrap();

    let mut soft = model.contacts().next().unwrap().clone();
    soft.kind = ContactKind::Soft;
    model
        .add_interaction(ElementId(1), ElementId(2), Some(Interaction::Contact(soft)))
        .unwrap();

    model
        .set_transformation(ElementId(2), Transform::from_translation(Vec3::new(0.5, 0.0, 1.0)))
        .unwrap();
    model.compute_contacts(&settings).unwrap();
    let contact = model.contacts().next().unwrap();
    assert_eq!(contact.kind, ContactKind::Soft);
    assert_relative_eq!(contact.area, 0.5, epsilon = 1e-9);
}

#[test]
fn test_nested_transform_reaches_contact() {
    let mut model = Model::default();
    model.add_element(cube(1, 0.0, 0.0, 0.0), None).unwrap();
    let carrier = model.add_element(cube(2, 5.0, 0.0, 0.0), None).unwrap();
    // child sits on top of its parent, in the parent's frame
    model.add_element(cube(3, 0.0, 0.0, 1.0), Some(carrier)).unwrap();
    model.compute_contacts(&ContactSettings::default()).unwrap();

    assert!(model.has_interaction(ElementId(2), ElementId(3)));
    assert!(!model.has_interaction(ElementId(1), ElementId(2)));

    // moving the parent onto cube 1 carries the child along
    model
        .set_transformation(ElementId(2), Transform::from_translation(Vec3::new(0.0, 0.0, 1.0)))
        .unwrap();
    let report = model.compute_contacts(&ContactSettings::default()).unwrap();
    assert_eq!((report.added, report.updated), (1, 1));
    assert!(model.has_interaction(ElementId(1), ElementId(2)));
    assert!(model.has_interaction(ElementId(2), ElementId(3)));
    assert!(!model.has_interaction(ElementId(1), ElementId(3)));
}

#[test]
fn test_lenient_pass_skips_non_convex_faces() {
    crate::foundation::logging::try_init();
    let mut model = Model::default();
    model.add_element(l_plate(0), None).unwrap();
    model.add_element(cube(1, 0.0, 0.0, 0.2), None).unwrap();
    model.add_element(cube(2, 10.0, 0.0, 0.0), None).unwrap();
    model.add_element(cube(3, 10.0, 0.0, 1.0), None).unwrap();

    let report = model.compute_contacts(&ContactSettings::default()).unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0 .0, ElementId(0));
    assert_eq!(report.added, 1);
    assert!(model.has_interaction(ElementId(2), ElementId(3)));
    assert!(!model.has_interaction(ElementId(0), ElementId(1)));
}

#[test]
fn test_strict_pass_aborts_without_changes() {
    let mut model = Model::default();
    model.add_element(l_plate(0), None).unwrap();
    model.add_element(cube(1, 0.0, 0.0, 0.2), None).unwrap();
    model.add_element(cube(2, 10.0, 0.0, 0.0), None).unwrap();
    model.add_element(cube(3, 10.0, 0.0, 1.0), None).unwrap();

    let settings = ContactSettings {
        strict: true,
        ..ContactSettings::default()
    };
    assert!(matches!(model.compute_contacts(&settings), Err(ModelError::Geometry(_))));
    assert_eq!(model.graph().edge_count(), 0);
}

#[test]
fn test_tolerance_misuse_is_reported_first() {
    let mut model = stacked();
    let settings = ContactSettings {
        area_tolerance: 0.0,
        ..ContactSettings::default()
    };
    assert!(matches!(model.compute_contacts(&settings), Err(ModelError::Tolerance(_))));
    assert_eq!(model.graph().edge_count(), 0);
}

/// Two stacked pairs plus a slicer; the returned model has both contacts
fn sliced_away() -> Model {
    let mut model = Model::default();
    model.add_element(cube(0, 0.0, 0.0, 0.0), None).unwrap();
    model.add_element(cube(1, 0.0, 0.0, 1.0), None).unwrap();
    model.add_element(cube(5, 20.0, 0.0, 0.0), None).unwrap();
    model.add_element(cube(6, 10.0, 0.0, 0.0), None).unwrap();
    model.add_element(cube(7, 20.0, 0.0, 1.0), None).unwrap();
    let report = model.compute_contacts(&ContactSettings::default()).unwrap();
    assert_eq!(report.added, 2);

    // cuts away every part of element 5
    let slice = Modifier::Slice {
        source: ElementId(6),
        plane: Plane::new(Point3::new(0.0, 0.0, -50.0), Vec3::z()),
    };
    model
        .add_interaction(ElementId(6), ElementId(5), Some(Interaction::Modifier(slice)))
        .unwrap();
    assert!(model.compute_model_geometry(ElementId(5)).is_err());
    model
}

#[test]
fn test_lenient_pass_leaves_out_unresolved_elements() {
    crate::foundation::logging::try_init();
    let mut model = sliced_away();

    let report = model.compute_contacts(&ContactSettings::default()).unwrap();
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].0, ElementId(5));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!((report.skipped[0].0 .0, report.skipped[0].0 .1), (ElementId(5), ElementId(7)));
    assert_eq!((report.added, report.updated, report.removed), (0, 1, 0));

    // the skipped pair keeps its last known contact
    assert_eq!(model.contacts().count(), 2);
    assert!(model.graph().edge(ElementId(5), ElementId(7)).unwrap().contact().is_some());
}

#[test]
fn test_strict_pass_fails_on_unresolved_element() {
    let mut model = sliced_away();
    let settings = ContactSettings {
        strict: true,
        ..ContactSettings::default()
    };
    assert!(matches!(model.compute_contacts(&settings), Err(ModelError::Geometry(_))));
    assert_eq!(model.contacts().count(), 2);
    assert_eq!(model.graph().edge_count(), 3);
}
