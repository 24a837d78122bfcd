//! Element removal, hierarchy integrity and cache invalidation

use std::collections::BTreeSet;

use approx::assert_relative_eq;

use super::cube;
use crate::elements::ElementId;
use crate::error::ModelError;
use crate::foundation::collections::NodeKey;
use crate::foundation::math::{Point3, Transform, Vec3};
use crate::model::{ChildPolicy, Interaction, Model};

fn assert_single_rooted(model: &Model) {
    let tree = model.tree();
    let root = tree.root();
    assert!(tree.node(root).unwrap().parent().is_none());

    let reachable: Vec<NodeKey> = tree.depth_first();
    let unique: BTreeSet<NodeKey> = reachable.iter().copied().collect();
    assert_eq!(reachable.len(), tree.len());
    assert_eq!(unique.len(), tree.len());
    for key in reachable {
        if key != root {
            assert_eq!(tree.ancestors(key).last(), Some(&root));
        }
    }
}

#[test]
fn test_remove_element_detaches_node_and_edges() {
    let mut model = Model::default();
    let group = model.add_group("course", None).unwrap();
    model.add_element(cube(0, 0.0, 0.0, 0.0), None).unwrap();
    let parent = model.add_element(cube(1, 0.0, 0.0, 1.0), Some(group)).unwrap();
    model.add_element(cube(2, 0.0, 0.0, 1.0), Some(parent)).unwrap();
    model.add_interaction(ElementId(0), ElementId(1), None).unwrap();
    model
        .add_interaction(ElementId(1), ElementId(2), Some(Interaction::generic("dowel", "oak")))
        .unwrap();
    model.add_interaction(ElementId(0), ElementId(2), None).unwrap();

    let removed = model.remove_element(ElementId(1)).unwrap();
    assert_eq!(removed.id(), ElementId(1));

    assert!(!model.has_element(ElementId(1)));
    assert!(!model.graph().has_node(ElementId(1)));
    assert_eq!(model.graph().edge_count(), 1);
    assert!(model.has_interaction(ElementId(0), ElementId(2)));
    assert!(model.tree().find_element(ElementId(1)).is_none());

    // the child moved up to the group
    let child = model.tree().find_element(ElementId(2)).unwrap();
    assert_eq!(model.tree().node(child).unwrap().parent(), Some(group));
    assert_single_rooted(&model);
}

#[test]
fn test_reparented_child_loses_parent_transform() {
    let mut model = Model::default();
    let parent = model.add_element(cube(1, 10.0, 0.0, 0.0), None).unwrap();
    model.add_element(cube(2, 0.0, 0.0, 1.0), Some(parent)).unwrap();
    let before = model.compute_model_transformation(ElementId(2)).unwrap();
    assert_relative_eq!(before.translation, Vec3::new(10.0, 0.0, 1.0), epsilon = 1e-12);

    model.remove_element(ElementId(1)).unwrap();
    assert!(model.element(ElementId(2)).unwrap().is_transform_dirty());
    let after = model.compute_model_transformation(ElementId(2)).unwrap();
    assert_relative_eq!(after.translation, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
}

#[test]
fn test_cascade_removal_takes_subtree() {
    let mut model = Model::default();
    let group = model.add_group("wall", None).unwrap();
    for (i, x) in [(0, 0.0), (1, 1.0), (2, 2.0)] {
        model.add_element(cube(i, x, 0.0, 0.0), Some(group)).unwrap();
    }
    model.add_element(cube(9, 0.0, 5.0, 0.0), None).unwrap();
    model.add_interaction(ElementId(2), ElementId(9), None).unwrap();

    let removed = model.remove_node_with(group, ChildPolicy::Cascade).unwrap();
    let ids: BTreeSet<ElementId> = removed.iter().map(|e| e.id()).collect();
    assert_eq!(ids, BTreeSet::from([ElementId(0), ElementId(1), ElementId(2)]));
    assert_eq!(model.element_ids(), vec![ElementId(9)]);
    assert_eq!(model.graph().edge_count(), 0);
    assert_eq!(model.tree().len(), 2);
    assert_single_rooted(&model);
}

#[test]
fn test_remove_unknown_element_fails() {
    let mut model = Model::default();
    model.add_element(cube(1, 0.0, 0.0, 0.0), None).unwrap();
    assert!(matches!(model.remove_element(ElementId(7)), Err(ModelError::Lookup(_))));
    assert_eq!(model.element_count(), 1);
}

#[test]
fn test_move_node_rejects_cycle_and_keeps_model() {
    let mut model = Model::default();
    let outer = model.add_group("outer", None).unwrap();
    let inner = model.add_group("inner", Some(outer)).unwrap();
    model.add_element(cube(1, 0.0, 0.0, 0.0), Some(inner)).unwrap();

    assert!(matches!(model.move_node(outer, inner), Err(ModelError::Structural(_))));
    assert_eq!(model.tree().node(inner).unwrap().parent(), Some(outer));
    assert_single_rooted(&model);
}

#[test]
fn test_transform_change_dirties_only_adjacent_geometry() {
    let mut model = Model::default();
    for (i, x) in [(0, 0.0), (1, 2.0), (2, 4.0), (3, 6.0)] {
        model.add_element(cube(i, x, 0.0, 0.0), None).unwrap();
    }
    model.add_interaction(ElementId(0), ElementId(1), None).unwrap();
    model.add_interaction(ElementId(1), ElementId(2), None).unwrap();
    model.resolve().unwrap();
    for id in model.element_ids() {
        let element = model.element(id).unwrap();
        assert!(!element.is_transform_dirty() && !element.is_geometry_dirty());
    }

    model
        .set_transformation(ElementId(0), Transform::from_translation(Vec3::new(0.0, 0.0, 3.0)))
        .unwrap();

    let e0 = model.element(ElementId(0)).unwrap();
    assert!(e0.is_transform_dirty() && e0.is_geometry_dirty());
    let e1 = model.element(ElementId(1)).unwrap();
    assert!(!e1.is_transform_dirty());
    assert!(e1.is_geometry_dirty());
    assert!(e1.model_transformation().is_some());
    assert!(e1.model_geometry().is_none());
    for id in [ElementId(2), ElementId(3)] {
        let element = model.element(id).unwrap();
        assert!(!element.is_transform_dirty() && !element.is_geometry_dirty());
    }

    let geometry = model.compute_model_geometry(ElementId(0)).unwrap();
    assert_relative_eq!(geometry.centroid().unwrap(), Point3::new(0.5, 0.5, 3.5), epsilon = 1e-12);
    assert!(!model.element(ElementId(0)).unwrap().is_geometry_dirty());
    assert!(model.element(ElementId(1)).unwrap().is_geometry_dirty());
}

#[test]
fn test_model_frame_moves_everything() {
    let mut model = Model::default();
    model.add_element(cube(1, 0.0, 0.0, 0.0), None).unwrap();
    model.add_element(cube(2, 3.0, 0.0, 0.0), None).unwrap();
    model.resolve().unwrap();

    model.transform(&Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)));
    for element in model.resolved_elements().unwrap() {
        assert!(element.transformation.translation.z > 1.99);
        assert!(element.geometry.vertices.iter().all(|p| p.z >= 2.0 - 1e-12));
    }
}
