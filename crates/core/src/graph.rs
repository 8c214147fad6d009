//! Module graph recorded by a reference traversal
//!
//! Uses `petgraph::StableGraph` so node indices handed out during the
//! traversal stay valid for the whole report.

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};

use crate::module::ModuleIdentity;

/// A module seen during the traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    pub identity: ModuleIdentity,
    pub state: NodeState,
}

/// What happened to a module during the traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// The starting module; never passed to the loader
    Root,
    /// Passed to the loader exactly once
    Loaded,
    /// Rejected by the edge filter; neither loaded nor explored
    Excluded,
}

/// A reference edge between two modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// The edge caused its target to be loaded
    Loaded,
    /// The target had already been visited
    Revisited,
    /// The filter rejected the target
    Pruned,
}

/// Modules and references seen by one traversal
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    inner: StableGraph<ModuleNode, Reference>,
    index: HashMap<ModuleIdentity, NodeIndex>,
    root: NodeIndex,
    load_order: Vec<ModuleIdentity>,
}

impl ModuleGraph {
    /// Create a graph containing only the root module
    pub fn new(root: ModuleIdentity) -> Self {
        let mut inner = StableGraph::new();
        let root_index = inner.add_node(ModuleNode {
            identity: root.clone(),
            state: NodeState::Root,
        });

        let mut index = HashMap::new();
        index.insert(root, root_index);

        Self {
            inner,
            index,
            root: root_index,
            load_order: Vec::new(),
        }
    }

    /// Identity of the root module
    pub fn root(&self) -> &ModuleIdentity {
        &self.inner[self.root].identity
    }

    /// Record that `to` was loaded through a reference from `from`
    pub fn record_load(&mut self, from: &ModuleIdentity, to: &ModuleIdentity) {
        self.load_order.push(to.clone());
        self.link(from, to, NodeState::Loaded, ReferenceKind::Loaded);
    }

    /// Record a reference to a module that was already visited
    pub fn record_revisit(&mut self, from: &ModuleIdentity, to: &ModuleIdentity) {
        self.link(from, to, NodeState::Loaded, ReferenceKind::Revisited);
    }

    /// Record a reference rejected by the filter
    pub fn record_pruned(&mut self, from: &ModuleIdentity, to: &ModuleIdentity) {
        self.link(from, to, NodeState::Excluded, ReferenceKind::Pruned);
    }

    fn link(&mut self, from: &ModuleIdentity, to: &ModuleIdentity, state: NodeState, kind: ReferenceKind) {
        let source = self.ensure_node(from, NodeState::Loaded);
        let target = self.ensure_node(to, state);
        self.inner.add_edge(source, target, Reference { kind });
    }

    fn ensure_node(&mut self, identity: &ModuleIdentity, state: NodeState) -> NodeIndex {
        if let Some(&existing) = self.index.get(identity) {
            return existing;
        }
        let node = self.inner.add_node(ModuleNode {
            identity: identity.clone(),
            state,
        });
        self.index.insert(identity.clone(), node);
        node
    }

    /// Modules passed to the loader, in load order
    pub fn loaded(&self) -> &[ModuleIdentity] {
        &self.load_order
    }

    /// Modules rejected by the filter
    pub fn excluded(&self) -> impl Iterator<Item = &ModuleIdentity> {
        self.inner
            .node_weights()
            .filter(|node| node.state == NodeState::Excluded)
            .map(|node| &node.identity)
    }

    pub fn contains(&self, identity: &ModuleIdentity) -> bool {
        self.index.contains_key(identity)
    }

    /// State of a module, if it was seen at all
    pub fn state_of(&self, identity: &ModuleIdentity) -> Option<NodeState> {
        self.index.get(identity).map(|&idx| self.inner[idx].state)
    }

    /// Outgoing references of a module, with their kinds
    pub fn references_of(&self, identity: &ModuleIdentity) -> Vec<(&ModuleIdentity, ReferenceKind)> {
        let Some(&idx) = self.index.get(identity) else {
            return Vec::new();
        };
        self.inner
            .edges(idx)
            .map(|edge| (&self.inner[edge.target()].identity, edge.weight().kind))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.inner.node_weights()
    }

    /// All references as (source, target, kind)
    pub fn edge_endpoints(&self) -> impl Iterator<Item = (&ModuleIdentity, &ModuleIdentity, ReferenceKind)> {
        self.inner.edge_references().map(|e| {
            (
                &self.inner[e.source()].identity,
                &self.inner[e.target()].identity,
                e.weight().kind,
            )
        })
    }

    /// Serializable summary of the graph
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut excluded: Vec<ModuleIdentity> = self.excluded().cloned().collect();
        excluded.sort();

        GraphSnapshot {
            root: self.root().clone(),
            loaded: self.load_order.clone(),
            excluded,
            references: self
                .edge_endpoints()
                .map(|(from, to, kind)| SnapshotReference {
                    from: from.clone(),
                    to: to.clone(),
                    kind,
                })
                .collect(),
        }
    }
}

/// Serializable form of a [`ModuleGraph`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub root: ModuleIdentity,
    pub loaded: Vec<ModuleIdentity>,
    pub excluded: Vec<ModuleIdentity>,
    pub references: Vec<SnapshotReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReference {
    pub from: ModuleIdentity,
    pub to: ModuleIdentity,
    pub kind: ReferenceKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ModuleIdentity {
        ModuleIdentity::new(name)
    }

    #[test]
    fn test_new_graph_has_only_root() {
        let graph = ModuleGraph::new(id("root"));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.root(), &id("root"));
        assert_eq!(graph.state_of(&id("root")), Some(NodeState::Root));
        assert!(graph.loaded().is_empty());
    }

    #[test]
    fn test_record_edges() {
        let mut graph = ModuleGraph::new(id("root"));
        graph.record_load(&id("root"), &id("a"));
        graph.record_load(&id("a"), &id("b"));
        graph.record_revisit(&id("root"), &id("b"));
        graph.record_pruned(&id("a"), &id("blocked"));

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.loaded(), &[id("a"), id("b")]);
        assert_eq!(graph.excluded().collect::<Vec<_>>(), vec![&id("blocked")]);
        assert_eq!(graph.state_of(&id("b")), Some(NodeState::Loaded));
        assert_eq!(graph.state_of(&id("missing")), None);

        let mut from_a = graph.references_of(&id("a"));
        from_a.sort();
        assert_eq!(
            from_a,
            vec![(&id("b"), ReferenceKind::Loaded), (&id("blocked"), ReferenceKind::Pruned)]
        );
    }

    #[test]
    fn test_edge_endpoints_wiring() {
        let mut graph = ModuleGraph::new(id("root"));
        graph.record_load(&id("root"), &id("a"));

        let edges: Vec<_> = graph.edge_endpoints().collect();
        assert_eq!(edges, vec![(&id("root"), &id("a"), ReferenceKind::Loaded)]);
    }

    #[test]
    fn test_snapshot_serialization() {
        let mut graph = ModuleGraph::new(id("root"));
        graph.record_load(&id("root"), &id("a"));
        graph.record_pruned(&id("root"), &id("x"));

        let snapshot = graph.snapshot();
        assert_eq!(snapshot.loaded, vec![id("a")]);
        assert_eq!(snapshot.excluded, vec![id("x")]);

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: GraphSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
        assert!(json.contains(r#""kind":"pruned""#));
    }
}
