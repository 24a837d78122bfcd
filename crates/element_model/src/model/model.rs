//! The element model
//!
//! Owns the element registry, the spatial hierarchy and the interaction
//! graph, and keeps per-element model-space caches consistent with them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::config::ContactSettings;
use crate::contact::{ContactDetector, ContactReport};
use crate::elements::{Element, ElementId, Shape};
use crate::error::{ModelError, ModelResult};
use crate::foundation::collections::NodeKey;
use crate::foundation::math::{Plane, Transform};
use crate::geometry::Polyhedron;

use super::graph::{EdgeData, ElementPair, InteractionGraph};
use super::interaction::{Contact, Interaction, InteractionKind, Modifier};
use super::tree::{ChildPolicy, ElementTree};

/// Counts reported by [`Model::summary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSummary {
    /// Registered elements
    pub elements: usize,
    /// Direct children of the tree root
    pub children: usize,
    /// Interaction graph edges
    pub interactions: usize,
    /// Tree nodes, root included
    pub tree_nodes: usize,
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Model with {} elements, {} children, {} interactions, {} tree nodes>",
            self.elements, self.children, self.interactions, self.tree_nodes
        )
    }
}

/// Element with its resolved model-space values
#[derive(Debug, Clone, Copy)]
pub struct ResolvedElement<'a> {
    /// The element
    pub element: &'a Element,
    /// Element-to-model transformation
    pub transformation: &'a Transform,
    /// Model-space geometry after modifiers
    pub geometry: &'a Polyhedron,
}

/// Composite model of elements, hierarchy and interactions
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    frame: Transform,
    elements: BTreeMap<ElementId, Element>,
    tree: ElementTree,
    graph: InteractionGraph,
    clock: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self::new("model")
    }
}

impl Model {
    /// Create an empty model
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame: Transform::identity(),
            elements: BTreeMap::new(),
            tree: ElementTree::default(),
            graph: InteractionGraph::new(),
            clock: 0,
        }
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transformation applied before the root of every ancestor chain
    pub fn frame(&self) -> &Transform {
        &self.frame
    }

    /// Replace the model frame; every element becomes transform-dirty
    pub fn set_frame(&mut self, frame: Transform) {
        self.frame = frame;
        let epoch = self.tick();
        for element in self.elements.values_mut() {
            element.invalidate_transform(epoch);
        }
    }

    /// Apply `transformation` to the whole model
    pub fn transform(&mut self, transformation: &Transform) {
        self.set_frame(transformation.combine(&self.frame));
    }

    /// Spatial hierarchy
    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    /// Interaction graph
    pub fn graph(&self) -> &InteractionGraph {
        &self.graph
    }

    /// Element by id
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Check if an element is registered
    pub fn has_element(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// All elements ordered by id
    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.values()
    }

    /// Ids of all elements, ascending
    pub fn element_ids(&self) -> Vec<ElementId> {
        self.elements.keys().copied().collect()
    }

    /// Number of registered elements
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// An id not used by any registered element
    pub fn next_id(&self) -> ElementId {
        ElementId(self.elements.keys().next_back().map_or(0, |id| id.0 + 1))
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn require(&self, id: ElementId) -> ModelResult<&Element> {
        self.elements
            .get(&id)
            .ok_or_else(|| ModelError::Lookup(format!("element {id} is not in the model")))
    }

    fn resolve_parent(&self, parent: Option<NodeKey>) -> ModelResult<NodeKey> {
        let parent = parent.unwrap_or_else(|| self.tree.root());
        if !self.tree.contains(parent) {
            return Err(ModelError::Lookup(format!("tree node {parent:?} does not exist")));
        }
        Ok(parent)
    }

    /// Register an element under `parent` (the root when `None`)
    ///
    /// Fails without modifying the model when the id is taken or the parent is unknown.
    pub fn add_element(&mut self, element: Element, parent: Option<NodeKey>) -> ModelResult<NodeKey> {
        let id = element.id();
        if self.elements.contains_key(&id) {
            return Err(ModelError::Lookup(format!("element {id} is already in the model")));
        }
        let parent = self.resolve_parent(parent)?;
        let node = self.tree.add_node(parent, element.name(), Some(id))?;
        self.graph.add_node(id);

        let epoch = self.tick();
        let mut element = element;
        element.invalidate_transform(epoch);
        log::debug!("Added element {} '{}' ({})", id, element.name(), element.shape().kind_name());
        self.elements.insert(id, element);
        Ok(node)
    }

    /// Add an element-less group node under `parent` (the root when `None`)
    pub fn add_group(&mut self, name: impl Into<String>, parent: Option<NodeKey>) -> ModelResult<NodeKey> {
        let parent = self.resolve_parent(parent)?;
        self.tree.add_group(parent, name)
    }

    /// Rename a tree node
    pub fn rename_node(&mut self, node: NodeKey, name: impl Into<String>) -> ModelResult<()> {
        self.tree.rename(node, name)
    }

    /// Move a tree node (and its subtree) under another node
    pub fn move_node(&mut self, node: NodeKey, new_parent: NodeKey) -> ModelResult<()> {
        self.tree.move_node(node, new_parent)?;
        let epoch = self.tick();
        let moved = self.subtree_elements(node);
        self.invalidate_transforms(&moved, epoch);
        Ok(())
    }

    /// Remove an element; its tree children move up to its parent
    pub fn remove_element(&mut self, id: ElementId) -> ModelResult<Element> {
        let mut removed = self.remove_element_with(id, ChildPolicy::Reparent)?;
        removed
            .pop()
            .ok_or_else(|| ModelError::Lookup(format!("element {id} is not in the model")))
    }

    /// Remove an element and handle its tree children per `policy`
    ///
    /// Incident graph edges are dropped. Returns every removed element, the
    /// requested one last.
    pub fn remove_element_with(&mut self, id: ElementId, policy: ChildPolicy) -> ModelResult<Vec<Element>> {
        self.require(id)?;
        let node = self
            .tree
            .find_element(id)
            .ok_or_else(|| ModelError::Lookup(format!("element {id} has no tree node")))?;
        self.remove_node_with(node, policy)
    }

    /// Remove a group or element node and handle its children per `policy`
    pub fn remove_node_with(&mut self, node: NodeKey, policy: ChildPolicy) -> ModelResult<Vec<Element>> {
        let children: Vec<NodeKey> = self
            .tree
            .node(node)
            .map(|n| n.children().to_vec())
            .unwrap_or_default();
        let own = self.tree.node(node).and_then(|n| n.element());

        let mut ids = self.tree.remove_node(node, policy)?;
        // the node's own element goes last
        if let Some(own) = own {
            ids.retain(|&id| id != own);
            ids.push(own);
        }

        let epoch = self.tick();
        if policy == ChildPolicy::Reparent {
            let mut moved = Vec::new();
            for child in children {
                moved.extend(self.subtree_elements(child));
            }
            self.invalidate_transforms(&moved, epoch);
        }

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            let neighbors: Vec<ElementId> = self.graph.neighbors(id).collect();
            let edges = self.graph.remove_node(id);
            for nbr in neighbors {
                if let Some(element) = self.elements.get_mut(&nbr) {
                    element.invalidate_geometry(epoch);
                }
            }
            if let Some(element) = self.elements.remove(&id) {
                log::debug!("Removed element {} with {} interactions", id, edges.len());
                removed.push(element);
            }
        }
        Ok(removed)
    }

    /// Set the element-to-parent transformation of an element
    ///
    /// The element and every element below it become transform-dirty; their
    /// graph neighbours become geometry-dirty.
    pub fn set_transformation(&mut self, id: ElementId, transformation: Transform) -> ModelResult<()> {
        self.require(id)?;
        let epoch = self.tick();
        if let Some(element) = self.elements.get_mut(&id) {
            element.set_transformation(transformation, epoch);
        }
        let affected = match self.tree.find_element(id) {
            Some(node) => self.subtree_elements(node),
            None => vec![id],
        };
        self.invalidate_transforms(&affected, epoch);
        Ok(())
    }

    /// Replace the shape of an element; its graph neighbours become geometry-dirty
    pub fn set_shape(&mut self, id: ElementId, shape: Shape) -> ModelResult<()> {
        self.require(id)?;
        let epoch = self.tick();
        if let Some(element) = self.elements.get_mut(&id) {
            element.set_shape(shape, epoch)?;
        }
        self.invalidate_neighbors(&[id], epoch);
        Ok(())
    }

    fn subtree_elements(&self, node: NodeKey) -> Vec<ElementId> {
        std::iter::once(node)
            .chain(self.tree.descendants(node))
            .filter_map(|key| self.tree.node(key).and_then(|n| n.element()))
            .collect()
    }

    fn invalidate_transforms(&mut self, ids: &[ElementId], epoch: u64) {
        for id in ids {
            if let Some(element) = self.elements.get_mut(id) {
                element.invalidate_transform(epoch);
            }
        }
        self.invalidate_neighbors(ids, epoch);
    }

    fn invalidate_neighbors(&mut self, ids: &[ElementId], epoch: u64) {
        let neighbors: BTreeSet<ElementId> = ids.iter().flat_map(|&id| self.graph.neighbors(id)).collect();
        for nbr in neighbors {
            if let Some(element) = self.elements.get_mut(&nbr) {
                element.invalidate_geometry(epoch);
            }
        }
    }

    /// Add an edge between two elements, optionally carrying an interaction
    ///
    /// A slice modifier must name one of the two elements as its source and a
    /// contact must connect exactly these two elements. Both endpoints become
    /// geometry-dirty.
    pub fn add_interaction(
        &mut self,
        a: ElementId,
        b: ElementId,
        interaction: Option<Interaction>,
    ) -> ModelResult<ElementPair> {
        self.require(a)?;
        self.require(b)?;
        if a == b {
            return Err(ModelError::Structural(format!("element {a} cannot interact with itself")));
        }
        let pair = ElementPair::new(a, b);
        match &interaction {
            Some(Interaction::Modifier(modifier)) if !pair.contains(modifier.source()) => {
                return Err(ModelError::Structural(format!(
                    "modifier source {} is not an endpoint of ({a}, {b})",
                    modifier.source()
                )));
            }
            Some(Interaction::Contact(contact)) if ElementPair::new(contact.a, contact.b) != pair => {
                return Err(ModelError::Structural(format!(
                    "contact between {} and {} stored on edge ({a}, {b})",
                    contact.a, contact.b
                )));
            }
            _ => {}
        }

        match interaction {
            Some(Interaction::Contact(contact)) => {
                self.graph.set_contact(contact)?;
            }
            Some(other) => self.graph.add_edge(a, b)?.interactions.push(other),
            None => {
                self.graph.add_edge(a, b)?;
            }
        }

        let epoch = self.tick();
        for id in [a, b] {
            if let Some(element) = self.elements.get_mut(&id) {
                element.invalidate_geometry(epoch);
            }
        }
        Ok(pair)
    }

    /// Remove the edge between two elements with all its interactions
    pub fn remove_interaction(&mut self, a: ElementId, b: ElementId) -> ModelResult<EdgeData> {
        let data = self
            .graph
            .remove_edge(a, b)
            .ok_or_else(|| ModelError::Lookup(format!("no interaction between {a} and {b}")))?;
        let epoch = self.tick();
        for id in [a, b] {
            if let Some(element) = self.elements.get_mut(&id) {
                element.invalidate_geometry(epoch);
            }
        }
        Ok(data)
    }

    /// Check if two elements share an edge
    pub fn has_interaction(&self, a: ElementId, b: ElementId) -> bool {
        self.graph.has_edge(a, b)
    }

    /// All interaction edges, ordered by element pair
    pub fn interactions(&self) -> impl Iterator<Item = (ElementPair, &EdgeData)> + '_ {
        self.graph.edges()
    }

    /// All contacts, ordered by element pair
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> + '_ {
        self.graph.contacts()
    }

    pub(crate) fn graph_mut(&mut self) -> &mut InteractionGraph {
        &mut self.graph
    }

    /// Element-to-model transformation, recomputed when stale
    ///
    /// The model frame comes first, then the ancestors' local transformations
    /// from the root down, then the element's own.
    pub fn compute_model_transformation(&mut self, id: ElementId) -> ModelResult<Transform> {
        let element = self.require(id)?;
        if let Some(cached) = element.model_transformation() {
            return Ok(*cached);
        }
        let local = *element.transformation();

        let parent_element = self.tree.find_element(id).and_then(|node| {
            self.tree
                .ancestors(node)
                .into_iter()
                .find_map(|key| self.tree.node(key).and_then(|n| n.element()))
        });
        let parent = match parent_element {
            Some(parent) => self.compute_model_transformation(parent)?,
            None => self.frame,
        };

        let value = parent.combine(&local);
        let epoch = self.clock;
        if let Some(element) = self.elements.get_mut(&id) {
            element.store_model_transformation(value, epoch);
        }
        Ok(value)
    }

    /// Model-space geometry of an element, recomputed when stale
    ///
    /// The local geometry is moved by the model transformation, then cut by
    /// every slice modifier other elements attach to it.
    pub fn compute_model_geometry(&mut self, id: ElementId) -> ModelResult<Polyhedron> {
        if let Some(cached) = self.require(id)?.model_geometry() {
            return Ok(cached.clone());
        }
        let transformation = self.compute_model_transformation(id)?;
        let mut geometry = self.require(id)?.geometry().transformed(&transformation);

        let slices: Vec<(ElementId, Plane)> = self
            .graph
            .neighbors(id)
            .filter_map(|nbr| self.graph.edge(id, nbr))
            .flat_map(|edge| edge.interactions.iter())
            .filter_map(|interaction| match interaction {
                Interaction::Modifier(Modifier::Slice { source, plane }) if *source != id => Some((*source, *plane)),
                _ => None,
            })
            .collect();
        for (source, plane) in slices {
            let source_transformation = self.compute_model_transformation(source)?;
            geometry = geometry.slice(&plane.transformed(&source_transformation))?;
        }

        let epoch = self.clock;
        if let Some(element) = self.elements.get_mut(&id) {
            element.store_model_geometry(geometry.clone(), epoch);
        }
        Ok(geometry)
    }

    /// Bring every element cache up to date
    pub fn resolve(&mut self) -> ModelResult<()> {
        for id in self.element_ids() {
            self.compute_model_geometry(id)?;
        }
        Ok(())
    }

    /// Elements with resolved model-space values, ordered by id
    pub fn resolved_elements(&mut self) -> ModelResult<Vec<ResolvedElement<'_>>> {
        self.resolve()?;
        let this: &Self = self;
        Ok(this
            .elements
            .values()
            .filter_map(|element| {
                Some(ResolvedElement {
                    element,
                    transformation: element.model_transformation()?,
                    geometry: element.model_geometry()?,
                })
            })
            .collect())
    }

    /// Groups of elements connected through edges carrying `kind`
    ///
    /// Only groups of two or more elements are returned; each group is sorted
    /// and the groups are ordered by their smallest id.
    pub fn connected_components(&self, kind: InteractionKind) -> Vec<Vec<ElementId>> {
        let mut visited: BTreeSet<ElementId> = BTreeSet::new();
        let mut components = Vec::new();
        for start in self.graph.nodes() {
            if !visited.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(id) = queue.pop_front() {
                for nbr in self.graph.neighbors(id) {
                    if visited.contains(&nbr) {
                        continue;
                    }
                    if self.graph.edge(id, nbr).map_or(false, |edge| edge.has_kind(kind)) {
                        visited.insert(nbr);
                        component.push(nbr);
                        queue.push_back(nbr);
                    }
                }
            }
            if component.len() > 1 {
                component.sort();
                components.push(component);
            }
        }
        components
    }

    /// Counts of elements, root children, interactions and tree nodes
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            elements: self.elements.len(),
            children: self.tree.node(self.tree.root()).map_or(0, |root| root.children().len()),
            interactions: self.graph.edge_count(),
            tree_nodes: self.tree.len(),
        }
    }

    /// Detect face-to-face contacts and write them into the interaction graph
    pub fn compute_contacts(&mut self, settings: &ContactSettings) -> ModelResult<ContactReport> {
        ContactDetector::new(settings.clone()).run(self)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(80);
        writeln!(f, "{rule}")?;
        writeln!(f, "{} {}", self.name, self.summary())?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Spatial Hierarchy")?;
        writeln!(f, "{rule}")?;
        write!(f, "{}", self.tree)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Element Interactions")?;
        writeln!(f, "{rule}")?;
        for (pair, edge) in self.graph.edges() {
            writeln!(f, "{} - {}", pair.0, pair.1)?;
            for interaction in &edge.interactions {
                writeln!(f, "  {interaction}")?;
            }
        }
        writeln!(f, "{rule}")
    }
}
