//! Undirected interaction graph between elements
//!
//! Nodes are element ids. Each unordered pair has at most one edge; the edge
//! carries a list of interactions with at most one contact among them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::elements::ElementId;
use crate::error::{ModelError, ModelResult};

use super::interaction::{Contact, Interaction, InteractionKind};

/// Unordered element pair stored with the smaller id first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementPair(pub ElementId, pub ElementId);

impl ElementPair {
    /// Create a new pair (always stores the smaller id first for consistency)
    pub fn new(a: ElementId, b: ElementId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    /// Check if the pair includes an element
    pub fn contains(&self, id: ElementId) -> bool {
        self.0 == id || self.1 == id
    }

    /// The endpoint opposite to `id`
    pub fn other(&self, id: ElementId) -> Option<ElementId> {
        if self.0 == id {
            Some(self.1)
        } else if self.1 == id {
            Some(self.0)
        } else {
            None
        }
    }
}

/// Interactions stored on one edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Interactions between the two endpoints
    pub interactions: Vec<Interaction>,
}

impl EdgeData {
    /// The contact on this edge, if any
    pub fn contact(&self) -> Option<&Contact> {
        self.interactions.iter().find_map(|i| match i {
            Interaction::Contact(contact) => Some(contact),
            _ => None,
        })
    }

    /// Check if the edge carries an interaction of the given kind
    pub fn has_kind(&self, kind: InteractionKind) -> bool {
        self.interactions.iter().any(|i| i.kind() == kind)
    }

    /// Check if the edge carries no interactions
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}

/// Undirected graph of element interactions
#[derive(Debug, Clone, Default)]
pub struct InteractionGraph {
    adjacency: BTreeMap<ElementId, BTreeSet<ElementId>>,
    edges: BTreeMap<ElementPair, EdgeData>,
}

impl InteractionGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; returns false if it was already present
    pub fn add_node(&mut self, id: ElementId) -> bool {
        if self.adjacency.contains_key(&id) {
            return false;
        }
        self.adjacency.insert(id, BTreeSet::new());
        true
    }

    /// Remove a node and all incident edges, returning the removed edges
    pub fn remove_node(&mut self, id: ElementId) -> Vec<(ElementPair, EdgeData)> {
        let Some(neighbors) = self.adjacency.remove(&id) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(neighbors.len());
        for other in neighbors {
            if let Some(set) = self.adjacency.get_mut(&other) {
                set.remove(&id);
            }
            let pair = ElementPair::new(id, other);
            if let Some(data) = self.edges.remove(&pair) {
                removed.push((pair, data));
            }
        }
        removed
    }

    /// Check if a node exists
    pub fn has_node(&self, id: ElementId) -> bool {
        self.adjacency.contains_key(&id)
    }

    /// All nodes, ascending
    pub fn nodes(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Add an edge between two existing nodes, or return the existing one
    pub fn add_edge(&mut self, a: ElementId, b: ElementId) -> ModelResult<&mut EdgeData> {
        if a == b {
            return Err(ModelError::Structural(format!("element {a} cannot interact with itself")));
        }
        for id in [a, b] {
            if !self.has_node(id) {
                return Err(ModelError::Lookup(format!("element {id} is not in the interaction graph")));
            }
        }
        if let Some(set) = self.adjacency.get_mut(&a) {
            set.insert(b);
        }
        if let Some(set) = self.adjacency.get_mut(&b) {
            set.insert(a);
        }
        Ok(self.edges.entry(ElementPair::new(a, b)).or_default())
    }

    /// Data on the edge between `a` and `b`
    pub fn edge(&self, a: ElementId, b: ElementId) -> Option<&EdgeData> {
        self.edges.get(&ElementPair::new(a, b))
    }

    /// Mutable data on the edge between `a` and `b`
    pub fn edge_mut(&mut self, a: ElementId, b: ElementId) -> Option<&mut EdgeData> {
        self.edges.get_mut(&ElementPair::new(a, b))
    }

    /// Check if an edge exists
    pub fn has_edge(&self, a: ElementId, b: ElementId) -> bool {
        self.edges.contains_key(&ElementPair::new(a, b))
    }

    /// Remove the edge between `a` and `b`
    pub fn remove_edge(&mut self, a: ElementId, b: ElementId) -> Option<EdgeData> {
        let data = self.edges.remove(&ElementPair::new(a, b))?;
        if let Some(set) = self.adjacency.get_mut(&a) {
            set.remove(&b);
        }
        if let Some(set) = self.adjacency.get_mut(&b) {
            set.remove(&a);
        }
        Some(data)
    }

    /// Neighbours of a node, ascending
    pub fn neighbors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        self.adjacency.get(&id).into_iter().flat_map(|set| set.iter().copied())
    }

    /// All edges, ordered by pair
    pub fn edges(&self) -> impl Iterator<Item = (ElementPair, &EdgeData)> + '_ {
        self.edges.iter().map(|(pair, data)| (*pair, data))
    }

    /// Store a contact on the edge of its elements, replacing any previous contact
    ///
    /// Returns true when the contact was new on that edge.
    pub fn set_contact(&mut self, contact: Contact) -> ModelResult<bool> {
        let edge = self.add_edge(contact.a, contact.b)?;
        if let Some(slot) = edge
            .interactions
            .iter_mut()
            .find(|i| i.kind() == InteractionKind::Contact)
        {
            *slot = Interaction::Contact(contact);
            return Ok(false);
        }
        edge.interactions.push(Interaction::Contact(contact));
        Ok(true)
    }

    /// Remove the contact between `a` and `b`
    ///
    /// The edge itself is removed once no other interaction remains on it.
    pub fn clear_contact(&mut self, a: ElementId, b: ElementId) -> Option<Contact> {
        let edge = self.edge_mut(a, b)?;
        let position = edge
            .interactions
            .iter()
            .position(|i| i.kind() == InteractionKind::Contact)?;
        let removed = edge.interactions.remove(position);
        if edge.is_empty() {
            self.remove_edge(a, b);
        }
        match removed {
            Interaction::Contact(contact) => Some(contact),
            _ => None,
        }
    }

    /// All contacts, ordered by element pair
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> + '_ {
        self.edges.values().filter_map(EdgeData::contact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Frame;

    fn contact(a: u64, b: u64, area: f64) -> Contact {
        Contact {
            a: ElementId(a),
            b: ElementId(b),
            polygons: Vec::new(),
            area,
            frame: Frame::world_xy(),
            kind: Default::default(),
        }
    }

    fn graph_with(n: u64) -> InteractionGraph {
        let mut graph = InteractionGraph::new();
        for i in 0..n {
            graph.add_node(ElementId(i));
        }
        graph
    }

    #[test]
    fn test_edges_are_unordered() {
        let mut graph = graph_with(3);
        graph.add_edge(ElementId(2), ElementId(0)).unwrap();
        assert!(graph.has_edge(ElementId(0), ElementId(2)));
        assert_eq!(graph.edge_count(), 1);

        graph.add_edge(ElementId(0), ElementId(2)).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.neighbors(ElementId(0)).collect::<Vec<_>>(), vec![ElementId(2)]);
    }

    #[test]
    fn test_invalid_edges() {
        let mut graph = graph_with(2);
        assert!(matches!(
            graph.add_edge(ElementId(1), ElementId(1)),
            Err(ModelError::Structural(_))
        ));
        assert!(matches!(
            graph.add_edge(ElementId(1), ElementId(5)),
            Err(ModelError::Lookup(_))
        ));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.neighbors(ElementId(1)).count(), 0);
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut graph = graph_with(4);
        graph.add_edge(ElementId(0), ElementId(1)).unwrap();
        graph.add_edge(ElementId(1), ElementId(2)).unwrap();
        graph.add_edge(ElementId(2), ElementId(3)).unwrap();

        let removed = graph.remove_node(ElementId(1));
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.has_edge(ElementId(2), ElementId(3)));
        assert_eq!(graph.neighbors(ElementId(0)).count(), 0);
    }

    #[test]
    fn test_contact_replacement_and_clearing() {
        let mut graph = graph_with(3);
        assert!(graph.set_contact(contact(0, 1, 1.0)).unwrap());
        assert!(!graph.set_contact(contact(1, 0, 2.0)).unwrap());
        assert_eq!(graph.contacts().count(), 1);
        assert_eq!(graph.edge(ElementId(0), ElementId(1)).unwrap().contact().unwrap().area, 2.0);

        // a generic interaction keeps the edge alive after the contact goes
        graph.set_contact(contact(1, 2, 1.0)).unwrap();
        graph
            .edge_mut(ElementId(1), ElementId(2))
            .unwrap()
            .interactions
            .push(Interaction::generic("glue", "epoxy"));

        assert!(graph.clear_contact(ElementId(0), ElementId(1)).is_some());
        assert!(!graph.has_edge(ElementId(0), ElementId(1)));
        assert!(graph.clear_contact(ElementId(1), ElementId(2)).is_some());
        assert!(graph.has_edge(ElementId(1), ElementId(2)));
        assert!(graph.clear_contact(ElementId(1), ElementId(2)).is_none());
    }
}
