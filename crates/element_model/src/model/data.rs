//! Serialization schema for models
//!
//! The model is written as an element table, a nested tree that refers to
//! elements by id, and a graph of id pairs with their edge payloads. Cached
//! model-space values are not part of the schema; they are recomputed after
//! loading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::elements::{Element, ElementId, Shape};
use crate::error::{ModelError, ModelResult};
use crate::foundation::collections::NodeKey;
use crate::foundation::math::Transform;

use super::graph::EdgeData;
use super::model::Model;

/// Serialized element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementData {
    /// Stable id
    pub id: ElementId,
    /// Element name
    pub name: String,
    /// Local geometry
    pub shape: Shape,
    /// Element-to-parent transformation
    pub transformation: Transform,
    /// Fixed support flag
    #[serde(default)]
    pub is_support: bool,
}

/// Serialized tree node with its nested children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeData {
    /// Node name
    pub name: String,
    /// Element held by the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementId>,
    /// Children in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNodeData>,
}

/// Serialized interaction graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    /// Node ids
    pub nodes: Vec<ElementId>,
    /// Edges as `(a, b, payload)` triples
    pub edges: Vec<(ElementId, ElementId, EdgeData)>,
}

/// Serialized model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    /// Model name
    pub name: String,
    /// Model frame
    pub frame: Transform,
    /// Element table ordered by id
    pub elements: Vec<ElementData>,
    /// Spatial hierarchy starting at the root
    pub tree: TreeNodeData,
    /// Interaction graph
    pub graph: GraphData,
}

impl Model {
    /// Snapshot of the model in its serialization schema
    pub fn to_data(&self) -> ModelData {
        let elements = self
            .elements()
            .map(|element| ElementData {
                id: element.id(),
                name: element.name().to_string(),
                shape: element.shape().clone(),
                transformation: *element.transformation(),
                is_support: element.is_support(),
            })
            .collect();

        let graph = GraphData {
            nodes: self.graph().nodes().collect(),
            edges: self
                .interactions()
                .map(|(pair, edge)| (pair.0, pair.1, edge.clone()))
                .collect(),
        };

        ModelData {
            name: self.name().to_string(),
            frame: *self.frame(),
            elements,
            tree: self.tree_data(self.tree().root()),
            graph,
        }
    }

    fn tree_data(&self, key: NodeKey) -> TreeNodeData {
        let tree = self.tree();
        match tree.node(key) {
            Some(node) => TreeNodeData {
                name: node.name().to_string(),
                element: node.element(),
                children: node.children().iter().map(|&child| self.tree_data(child)).collect(),
            },
            None => TreeNodeData {
                name: String::new(),
                element: None,
                children: Vec::new(),
            },
        }
    }

    /// Rebuild a model from its serialization schema
    ///
    /// Elements missing from the tree are placed under the root. Unknown ids,
    /// duplicate ids and invalid edges are reported as serialization errors.
    pub fn from_data(data: ModelData) -> ModelResult<Self> {
        let mut table: BTreeMap<ElementId, ElementData> = BTreeMap::new();
        for element in data.elements {
            let id = element.id;
            if table.insert(id, element).is_some() {
                return Err(ModelError::Serialization(format!("element {id} is listed twice")));
            }
        }

        let mut model = Model::new(data.name);
        model.set_frame(data.frame);
        let root = model.tree().root();
        model.rename_node(root, data.tree.name)?;

        let mut stack: Vec<(NodeKey, TreeNodeData)> = data.tree.children.into_iter().rev().map(|c| (root, c)).collect();
        while let Some((parent, node)) = stack.pop() {
            let key = match node.element {
                Some(id) => {
                    let element = table.remove(&id).ok_or_else(|| {
                        ModelError::Serialization(format!("tree node '{}' refers to unknown element {id}", node.name))
                    })?;
                    let key = model.add_element(build_element(element)?, Some(parent))?;
                    model.rename_node(key, node.name)?;
                    key
                }
                None => model.add_group(node.name, Some(parent))?,
            };
            stack.extend(node.children.into_iter().rev().map(|c| (key, c)));
        }

        for (id, element) in table {
            log::warn!("Element {} is not placed in the tree, adding it under the root", id);
            model.add_element(build_element(element)?, None)?;
        }

        for id in &data.graph.nodes {
            if !model.has_element(*id) {
                return Err(ModelError::Serialization(format!("graph node {id} has no element")));
            }
        }
        for (a, b, edge) in data.graph.edges {
            let wrap = |e: ModelError| ModelError::Serialization(format!("edge ({a}, {b}): {e}"));
            if edge.is_empty() {
                model.add_interaction(a, b, None).map_err(wrap)?;
            }
            for interaction in edge.interactions {
                model.add_interaction(a, b, Some(interaction)).map_err(wrap)?;
            }
        }

        log::debug!(
            "Loaded model '{}' with {} elements and {} interactions",
            model.name(),
            model.element_count(),
            model.graph().edge_count()
        );
        Ok(model)
    }
}

fn build_element(data: ElementData) -> ModelResult<Element> {
    Ok(Element::new(data.id, data.name, data.shape)?
        .with_transformation(data.transformation)
        .with_support(data.is_support))
}
