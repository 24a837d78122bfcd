//! Model composition: element registry, hierarchy and interaction graph

mod data;
mod graph;
mod interaction;
#[allow(clippy::module_inception)]
mod model;
mod tree;

#[cfg(test)]
mod tests;

pub use data::{ElementData, GraphData, ModelData, TreeNodeData};
pub use graph::{EdgeData, ElementPair, InteractionGraph};
pub use interaction::{Contact, ContactKind, Interaction, InteractionKind, Modifier};
pub use model::{Model, ModelSummary, ResolvedElement};
pub use tree::{ChildPolicy, ElementTree, TreeNode};
