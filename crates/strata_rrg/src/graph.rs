//! Arena storage for the logical routing graph.
//!
//! Nodes and edges live in dense vectors indexed by [`NodeId`] and
//! [`EdgeId`]; per-node adjacency lists make fan-in and fan-out queries
//! cheap. The graph is rebuilt from scratch whenever the composition
//! changes and is never mutated afterwards.

use crate::node::{NodeKind, NodeName, RoutingNode, WireNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strata_common::{EdgeId, NodeId, SwitchKind, SynthResult, SynthesisError};

/// A directed edge through one programmable switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Driving node.
    pub src: NodeId,
    /// Driven node.
    pub dst: NodeId,
    /// Switch the connection is programmed through.
    pub switch: SwitchKind,
    /// Tile displacement `(dx, dy)` from the source's tile to the sink's.
    pub offset: (i32, i32),
    /// Tap of a vertical wire the connection leaves from; `None` means the wire end.
    pub tap: Option<u32>,
}

/// The logical routing-resource graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingGraph {
    nodes: Vec<RoutingNode>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    #[serde(skip)]
    index: HashMap<NodeName, NodeId>,
}

impl RoutingGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its ID.
    ///
    /// Fails if a node with the same logical name already exists.
    pub fn add_node(&mut self, name: NodeName, ptc: u32) -> SynthResult<NodeId> {
        if self.index.contains_key(&name) {
            return Err(SynthesisError::composition(format!(
                "duplicate routing node '{name}'"
            )));
        }
        let id = NodeId::from_raw(self.nodes.len() as u32);
        self.nodes.push(RoutingNode {
            name,
            kind: name.kind(),
            ptc,
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.index.insert(name, id);
        Ok(id)
    }

    /// Adds an edge between two existing nodes and returns its ID.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        switch: SwitchKind,
        offset: (i32, i32),
        tap: Option<u32>,
    ) -> EdgeId {
        let id = EdgeId::from_raw(self.edges.len() as u32);
        self.edges.push(Edge {
            src,
            dst,
            switch,
            offset,
            tap,
        });
        self.outgoing[src.index()].push(id);
        self.incoming[dst.index()].push(id);
        id
    }

    /// Adds an edge between two nodes given by name.
    ///
    /// Fails if either endpoint has not been declared.
    pub fn connect(
        &mut self,
        src: &NodeName,
        dst: &NodeName,
        switch: SwitchKind,
        offset: (i32, i32),
        tap: Option<u32>,
    ) -> SynthResult<EdgeId> {
        let s = self.require(src)?;
        let d = self.require(dst)?;
        Ok(self.add_edge(s, d, switch, offset, tap))
    }

    fn require(&self, name: &NodeName) -> SynthResult<NodeId> {
        self.id(name).ok_or_else(|| {
            SynthesisError::composition(format!("edge references undeclared node '{name}'"))
        })
    }

    /// Looks up a node by logical name.
    pub fn id(&self, name: &NodeName) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: NodeId) -> &RoutingNode {
        &self.nodes[id.index()]
    }

    /// Returns the edge with the given ID.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    /// Iterates over all nodes with their IDs, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &RoutingNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::from_raw(i as u32), n))
    }

    /// Iterates over all edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Iterates over the edges leaving a node.
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing[id.index()].iter().map(|e| self.edge(*e))
    }

    /// Iterates over the edges entering a node.
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.incoming[id.index()].iter().map(|e| self.edge(*e))
    }

    /// Number of edges entering a node, parallel edges included.
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.incoming[id.index()].len()
    }

    /// Number of edges leaving a node, parallel edges included.
    pub fn out_degree(&self, id: NodeId) -> usize {
        self.outgoing[id.index()].len()
    }

    /// Distinct successors of a node, in first-edge order.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = Vec::new();
        for edge in self.outgoing(id) {
            if !seen.contains(&edge.dst) {
                seen.push(edge.dst);
            }
        }
        seen
    }

    /// All wire nodes with their IDs, in insertion order.
    pub fn wires(&self) -> Vec<(NodeId, WireNode)> {
        self.nodes()
            .filter_map(|(id, n)| n.name.as_wire().map(|w| (id, *w)))
            .collect()
    }

    /// All nodes of one kind.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.kind == kind)
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns the total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Rebuilds the name index after deserialization.
    pub fn reindex(&mut self) {
        self.index = self
            .nodes()
            .map(|(id, n)| (n.name, id))
            .collect();
    }
}
