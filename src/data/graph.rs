use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::errors::Result;

/// An immutable undirected graph over hashable nodes. Nodes are kept in
/// insertion order so traversals over `nodes()` stay deterministic.
#[derive(Debug, Clone)]
pub struct Graph<N: Eq + Hash + Clone> {
    nodes: Vec<N>,
    neighbors: HashMap<N, HashSet<N>>,
}

impl<N: Eq + Hash + Clone> Graph<N> {
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn neighbors_of(&self, node: &N) -> Result<&HashSet<N>> {
        self.neighbors
            .get(node)
            .ok_or_else(|| "Node is not part of the graph.".into())
    }
}

#[derive(Debug, Clone)]
pub struct GraphBuilder<N: Eq + Hash + Clone> {
    nodes: Vec<N>,
    neighbors: HashMap<N, HashSet<N>>,
}

impl<N: Eq + Hash + Clone> GraphBuilder<N> {
    pub fn new() -> GraphBuilder<N> {
        GraphBuilder {
            nodes: Vec::new(),
            neighbors: HashMap::new(),
        }
    }

    /// Adds a node; re-adding an existing node is a no-op.
    pub fn add_node(&mut self, node: N) {
        if !self.neighbors.contains_key(&node) {
            self.nodes.push(node.clone());
            self.neighbors.insert(node, HashSet::new());
        }
    }

    /// Adds a symmetric edge. Both endpoints must already be nodes.
    pub fn add_edge(&mut self, a: &N, b: &N) -> Result<()> {
        if !self.neighbors.contains_key(a) || !self.neighbors.contains_key(b) {
            return Err("Both edge endpoints must be added to the graph first.".into());
        }
        self.neighbors
            .get_mut(a)
            .ok_or("Both edge endpoints must be added to the graph first.")?
            .insert(b.clone());
        self.neighbors
            .get_mut(b)
            .ok_or("Both edge endpoints must be added to the graph first.")?
            .insert(a.clone());
        Ok(())
    }

    pub fn build(self) -> Graph<N> {
        Graph {
            nodes: self.nodes,
            neighbors: self.neighbors,
        }
    }
}

impl<N: Eq + Hash + Clone> Default for GraphBuilder<N> {
    fn default() -> Self {
        GraphBuilder::new()
    }
}
