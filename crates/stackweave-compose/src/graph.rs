//! Dependency graph management using `petgraph`.
//!
//! Builds a directed acyclic graph from the references recorded in a plan
//! and resolves the topological order an executor must provision in.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::ResourceId;

/// A dependency graph of declared resources.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<ResourceId, ()>,
    /// Node lookup by resource id.
    nodes: HashMap<ResourceId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            nodes: HashMap::new(),
        }
    }

    /// Adds a resource node, returning the existing node if already present.
    pub fn add_resource(&mut self, id: &ResourceId) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        let _ = self.nodes.insert(id.clone(), idx);
        idx
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological sort yields dependencies first.
    ///
    /// # Errors
    ///
    /// Returns an error if either side was never added to the graph.
    pub fn add_dependency(&mut self, dependent: &ResourceId, dependency: &ResourceId) -> Result<()> {
        let edge = format!("edge {dependent} -> {dependency}");
        let to = self.node(dependent, &edge)?;
        let from = self.node(dependency, &edge)?;
        let _ = self.graph.update_edge(from, to, ());
        Ok(())
    }

    /// Returns the number of resources in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the graph holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns a topological ordering of resources for provisioning.
    ///
    /// Dependencies appear before the resources that depend on them.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if the graph contains a cycle.
    pub fn resolve_order(&self) -> Result<Vec<ResourceId>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let at = self
                    .graph
                    .node_weight(cycle.node_id())
                    .map_or_else(String::new, ToString::to_string);
                Err(StackweaveError::dependency_order(
                    format!("cyclic dependency at {at}"),
                    at,
                ))
            }
        }
    }

    fn node(&self, id: &ResourceId, requester: &str) -> Result<NodeIndex> {
        self.nodes
            .get(id)
            .copied()
            .ok_or_else(|| StackweaveError::dependency_order(requester, id.as_str()))
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
