//! File-level include graph.
//!
//! Edges point from the including file to the included file. `includers_of`
//! walks edges backwards to find every file that must be re-indexed when a
//! header changes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

/// Include edges between normalized paths.
///
/// A `StableDiGraph` keeps node indices valid across removals, so `node_map`
/// never needs rebuilding.
#[derive(Debug, Default, Clone)]
pub struct IncludeGraph {
    graph: StableDiGraph<PathBuf, ()>,
    node_map: HashMap<PathBuf, NodeIndex>,
}

impl IncludeGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, path: &Path) -> NodeIndex {
        if let Some(node) = self.node_map.get(path) {
            return *node;
        }
        let node = self.graph.add_node(path.to_path_buf());
        self.node_map.insert(path.to_path_buf(), node);
        node
    }

    /// Replace the direct includes of `file`.
    pub fn set_dependencies<'a>(&mut self, file: &Path, dependencies: impl IntoIterator<Item = &'a PathBuf>) {
        let node = self.node(file);
        self.clear_outgoing(node);
        for dependency in dependencies {
            let target = self.node(dependency);
            self.graph.update_edge(node, target, ());
        }
    }

    /// Forget the includes of `file`. The node stays while other files still include it.
    pub fn remove_file(&mut self, file: &Path) {
        let Some(&node) = self.node_map.get(file) else {
            return;
        };
        let targets: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        self.clear_outgoing(node);
        self.prune(node);
        for target in targets {
            self.prune(target);
        }
    }

    /// Files `file` includes directly.
    #[must_use]
    pub fn includes_of(&self, file: &Path) -> Vec<PathBuf> {
        let Some(&node) = self.node_map.get(file) else {
            return Vec::new();
        };
        let mut includes: Vec<PathBuf> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        includes.sort();
        includes
    }

    /// Every file that includes `file`, directly or transitively. Cycles are tolerated.
    #[must_use]
    pub fn includers_of(&self, file: &Path) -> Vec<PathBuf> {
        let Some(&start) = self.node_map.get(file) else {
            return Vec::new();
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            for includer in self.graph.neighbors_directed(current, Direction::Incoming) {
                if visited.insert(includer) {
                    result.push(self.graph[includer].clone());
                    queue.push_back(includer);
                }
            }
        }

        result.sort();
        result
    }

    /// Number of include edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn clear_outgoing(&mut self, node: NodeIndex) {
        let edges: Vec<_> = self.graph.edges(node).map(|e| e.id()).collect();
        for edge in edges {
            self.graph.remove_edge(edge);
        }
    }

    fn prune(&mut self, node: NodeIndex) {
        let isolated = self.graph.neighbors_undirected(node).next().is_none();
        if isolated && let Some(path) = self.graph.remove_node(node) {
            self.node_map.remove(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn transitive_includers_are_found() {
        let mut graph = IncludeGraph::new();
        graph.set_dependencies(&p("/b.cc"), &[p("/a.h")]);
        graph.set_dependencies(&p("/a.h"), &[p("/base.h")]);
        graph.set_dependencies(&p("/c.cc"), &[p("/base.h")]);

        assert_eq!(
            graph.includers_of(&p("/base.h")),
            vec![p("/a.h"), p("/b.cc"), p("/c.cc")]
        );
        assert_eq!(graph.includes_of(&p("/b.cc")), vec![p("/a.h")]);
    }

    #[test]
    fn set_dependencies_replaces_previous_edges() {
        let mut graph = IncludeGraph::new();
        graph.set_dependencies(&p("/b.cc"), &[p("/a.h"), p("/x.h")]);
        graph.set_dependencies(&p("/b.cc"), &[p("/a.h")]);

        assert!(graph.includers_of(&p("/x.h")).is_empty());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn cycles_terminate() {
        let mut graph = IncludeGraph::new();
        graph.set_dependencies(&p("/a.h"), &[p("/b.h")]);
        graph.set_dependencies(&p("/b.h"), &[p("/a.h")]);

        assert_eq!(graph.includers_of(&p("/a.h")), vec![p("/b.h")]);
    }

    #[test]
    fn remove_file_drops_edges_and_isolated_nodes() {
        let mut graph = IncludeGraph::new();
        graph.set_dependencies(&p("/b.cc"), &[p("/a.h")]);
        graph.set_dependencies(&p("/c.cc"), &[p("/a.h")]);

        graph.remove_file(&p("/b.cc"));
        assert_eq!(graph.includers_of(&p("/a.h")), vec![p("/c.cc")]);

        graph.remove_file(&p("/c.cc"));
        assert!(graph.includers_of(&p("/a.h")).is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.node_map.is_empty());
    }
}
