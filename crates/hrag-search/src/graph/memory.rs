//! In-process graph store backed by `petgraph`.
//!
//! Useful for offline runs and tests. Nodes carry a label and string
//! properties; edges carry a relationship type.

use std::collections::{BTreeMap, HashMap};

use hrag_core::config::{GraphTraversal, SeedSubscription};
use hrag_core::{GraphRecord, RetrievalError};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::GraphStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub label: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct InMemoryGraph {
    graph: DiGraph<Node, String>,
    // (label, key, value) -> node, for merge-style inserts.
    lookup: HashMap<(String, String, String), NodeIndex>,
}

impl InMemoryGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `from -[relationship]-> to` edges for each subscription,
    /// keyed the way `traversal` reads them.
    #[must_use]
    pub fn from_subscriptions(traversal: &GraphTraversal, subscriptions: &[SeedSubscription]) -> Self {
        let mut graph = Self::new();
        for sub in subscriptions {
            let customer =
                graph.merge_node(&traversal.from_label, &traversal.from_key, &sub.customer);
            let plan = graph.merge_node(&traversal.to_label, &traversal.to_key, &sub.plan);
            graph.add_edge(customer, &traversal.relationship, plan);
        }
        graph
    }

    /// Return the node with `label` whose `key` equals `value`, creating it
    /// if absent.
    pub fn merge_node(&mut self, label: &str, key: &str, value: &str) -> NodeIndex {
        let lookup_key = (label.to_owned(), key.to_owned(), value.to_owned());
        if let Some(idx) = self.lookup.get(&lookup_key) {
            return *idx;
        }
        let node = Node {
            label: label.to_owned(),
            properties: BTreeMap::from([(key.to_owned(), value.to_owned())]),
        };
        let idx = self.graph.add_node(node);
        self.lookup.insert(lookup_key, idx);
        idx
    }

    pub fn add_edge(&mut self, from: NodeIndex, relationship: &str, to: NodeIndex) {
        self.graph.add_edge(from, to, relationship.to_owned());
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl GraphStore for InMemoryGraph {
    fn run_traversal(&self, traversal: &GraphTraversal) -> Result<Vec<GraphRecord>, RetrievalError> {
        let limit = traversal.effective_limit();
        let rows = self
            .graph
            .edge_references()
            .filter(|edge| edge.weight() == &traversal.relationship)
            .filter_map(|edge| {
                let from = &self.graph[edge.source()];
                let to = &self.graph[edge.target()];
                if from.label != traversal.from_label || to.label != traversal.to_label {
                    return None;
                }
                let value = |node: &Node, key: &str| {
                    node.properties
                        .get(key)
                        .map_or(serde_json::Value::Null, |v| serde_json::Value::from(v.as_str()))
                };
                Some(
                    GraphRecord::new()
                        .with(traversal.from_alias.as_str(), value(from, &traversal.from_key))
                        .with(traversal.to_alias.as_str(), value(to, &traversal.to_key)),
                )
            })
            .take(limit)
            .collect();
        Ok(rows)
    }
}
