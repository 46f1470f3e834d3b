//! Heap snapshot graph
//!
//! An in-memory node/edge graph in the layout heap profilers expect: every node owns a
//! contiguous run of outgoing edges. Nodes are opened with `begin_node`, receive edges, and are
//! closed with `end_node`. Nodes may nest; edges always attach to the innermost open node.
//!
//! Formatting the graph into a profiler file is left to the embedder. `to_json` provides a plain
//! serialization for tooling and tests.

mod ids;
mod visitors;

use serde::Serialize;

pub use ids::{IdTracker, ReservedObjectId};
pub use visitors::{
    snapshot_object, snapshot_roots, EdgeAddingVisitor, PrimitiveNodeVisitor,
    SnapshotRootSectionVisitor, SnapshotRootVisitor,
};

/// Identifier of a node in the snapshot.
pub type NodeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Hidden,
    Array,
    String,
    Object,
    Code,
    Closure,
    Regexp,
    Number,
    Native,
    Synthetic,
    ConcatenatedString,
    SlicedString,
    Symbol,
    BigInt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Context,
    Element,
    Property,
    Internal,
    Hidden,
    Shortcut,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EdgeName {
    Named(String),
    Index(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub name: EdgeName,
    pub to: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub id: NodeId,
    pub self_size: usize,
    pub edge_count: usize,
    pub trace_node_id: u32,
}

#[derive(Debug, Default, Serialize)]
pub struct HeapSnapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Edges of each open node, innermost last
    #[serde(skip)]
    open: Vec<Vec<Edge>>,
}

impl HeapSnapshot {
    pub fn new() -> HeapSnapshot {
        HeapSnapshot::default()
    }

    /// Open a node. Edges added until the matching `end_node` belong to it.
    pub fn begin_node(&mut self) {
        self.open.push(Vec::new());
    }

    /// Close the innermost open node.
    pub fn end_node(
        &mut self,
        node_type: NodeType,
        name: &str,
        id: NodeId,
        self_size: usize,
        trace_node_id: u32,
    ) {
        let edges = match self.open.pop() {
            Some(edges) => edges,
            None => panic!("end_node called without a matching begin_node"),
        };

        self.nodes.push(Node {
            node_type,
            name: String::from(name),
            id,
            self_size,
            edge_count: edges.len(),
            trace_node_id,
        });
        self.edges.extend(edges);
    }

    pub fn add_named_edge(&mut self, edge_type: EdgeType, name: &str, to: NodeId) {
        self.push_edge(Edge {
            edge_type,
            name: EdgeName::Named(String::from(name)),
            to,
        });
    }

    pub fn add_indexed_edge(&mut self, edge_type: EdgeType, index: u32, to: NodeId) {
        self.push_edge(Edge {
            edge_type,
            name: EdgeName::Index(index),
            to,
        });
    }

    fn push_edge(&mut self, edge: Edge) {
        match self.open.last_mut() {
            Some(edges) => edges.push(edge),
            None => panic!("edge added outside of a node"),
        }
    }

    /// Whether a node is currently open.
    #[inline]
    pub fn in_node(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Find a closed node by ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// The outgoing edges of a closed node.
    pub fn edges_of(&self, id: NodeId) -> &[Edge] {
        let mut start = 0;
        for node in &self.nodes {
            if node.id == id {
                return &self.edges[start..start + node.edge_count];
            }
            start += node.edge_count;
        }
        &[]
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        debug_assert!(self.open.is_empty(), "serializing a snapshot with open nodes");
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_attach_to_node() {
        let mut snap = HeapSnapshot::new();
        snap.begin_node();
        snap.add_named_edge(EdgeType::Internal, "next", 7);
        snap.add_indexed_edge(EdgeType::Element, 0, 9);
        snap.end_node(NodeType::Object, "Thing", 5, 32, 0);

        assert_eq!(snap.nodes().len(), 1);
        assert_eq!(snap.nodes()[0].edge_count, 2);
        assert_eq!(snap.edges_of(5).len(), 2);
        assert_eq!(snap.edges_of(5)[1].name, EdgeName::Index(0));
    }

    #[test]
    fn test_nested_nodes_keep_edges_contiguous() {
        let mut snap = HeapSnapshot::new();
        snap.begin_node();
        snap.add_indexed_edge(EdgeType::Element, 1, 100);
        snap.begin_node();
        snap.add_named_edge(EdgeType::Internal, "inner", 200);
        snap.end_node(NodeType::Synthetic, "inner", 2, 0, 0);
        snap.add_indexed_edge(EdgeType::Element, 2, 101);
        snap.end_node(NodeType::Synthetic, "outer", 1, 0, 0);

        assert_eq!(snap.edges_of(2).len(), 1);
        let outer: Vec<NodeId> = snap.edges_of(1).iter().map(|e| e.to).collect();
        assert_eq!(outer, [100, 101]);
    }

    #[test]
    fn test_in_node_tracks_nesting() {
        let mut snap = HeapSnapshot::new();
        assert!(!snap.in_node());

        snap.begin_node();
        snap.begin_node();
        snap.end_node(NodeType::Synthetic, "inner", 3, 0, 0);
        assert!(snap.in_node());

        snap.end_node(NodeType::Synthetic, "outer", 1, 0, 0);
        assert!(!snap.in_node());
    }

    #[test]
    #[should_panic(expected = "outside of a node")]
    fn test_edge_outside_node() {
        HeapSnapshot::new().add_named_edge(EdgeType::Internal, "x", 1);
    }

    #[test]
    fn test_to_json() {
        let mut snap = HeapSnapshot::new();
        snap.begin_node();
        snap.add_named_edge(EdgeType::Weak, "0", 3);
        snap.end_node(NodeType::Synthetic, "(GC roots)", 1, 0, 0);

        let json: serde_json::Value = serde_json::from_str(&snap.to_json().unwrap()).unwrap();
        assert_eq!(json["nodes"][0]["name"], "(GC roots)");
        assert_eq!(json["nodes"][0]["type"], "synthetic");
        assert_eq!(json["edges"][0]["type"], "weak");
        assert_eq!(json["edges"][0]["name"], "0");
    }
}
