//! World state: nodes, edges and snapshots
//!
//! The world is the only mutable store the simulation touches. Every mutation
//! goes through `World` so the graph index stays in sync with the edge list.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::graph::GraphIndex;
use crate::settings::LinkMode;

/// Identifies a node. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identifies an edge. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Transient per-node flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    /// Position follows the pointer, physics skips it
    pub dragged: bool,
    /// Freshly shot from the launcher
    pub launched: bool,
    /// Travelling toward the portal at constant speed
    pub sucking: bool,
}

/// A list element on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Unique within the world
    pub address: String,
    pub value: i64,
    pub pos: Vec2,
    pub vel: Vec2,
    #[serde(default)]
    pub flags: NodeFlags,
}

impl Node {
    pub fn new(id: NodeId, address: impl Into<String>, value: i64, pos: Vec2) -> Self {
        Self {
            id,
            address: address.into(),
            value,
            pos,
            vel: Vec2::ZERO,
            flags: NodeFlags::default(),
        }
    }

    /// Whether the integrator should move this node
    pub fn is_free(&self) -> bool {
        !self.flags.dragged && !self.flags.sucking
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }
}

/// Pointer direction of an edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    #[default]
    Next,
    /// Mirror of a `Next` edge in doubly-linked mode
    Prev,
}

/// A directed pointer between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub kind: EdgeKind,
}

/// Deep copy of the world at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Live set of nodes and edges.
///
/// Serializes for inspection only; rebuild from JSON through a `Snapshot`
/// and `World::from_snapshot` so the graph index is populated.
#[derive(Debug, Clone, Serialize)]
pub struct World {
    pub link_mode: LinkMode,
    /// Sorted by id for deterministic iteration
    nodes: Vec<Node>,
    /// Sorted by id for deterministic iteration
    edges: Vec<Edge>,
    #[serde(skip)]
    index: GraphIndex,
    next_node_id: u32,
    next_edge_id: u32,
}

impl Default for World {
    fn default() -> Self {
        Self::new(LinkMode::Singly)
    }
}

impl World {
    pub fn new(link_mode: LinkMode) -> Self {
        Self {
            link_mode,
            nodes: Vec::new(),
            edges: Vec::new(),
            index: GraphIndex::default(),
            next_node_id: 1,
            next_edge_id: 1,
        }
    }

    /// Rebuild a world from a snapshot (ids continue after the largest seen)
    pub fn from_snapshot(link_mode: LinkMode, snapshot: Snapshot) -> Self {
        let mut world = Self::new(link_mode);
        world.next_node_id = snapshot.nodes.iter().map(|n| n.id.0 + 1).max().unwrap_or(1);
        world.next_edge_id = snapshot.edges.iter().map(|e| e.id.0 + 1).max().unwrap_or(1);
        world.nodes = snapshot.nodes;
        world.edges = snapshot.edges;
        world.normalize_order();
        world.index = GraphIndex::build(&world.edges);
        world
    }

    // === Read access ===

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn graph(&self) -> &GraphIndex {
        &self.index
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.position(id).map(|i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.position(id).map(move |i| &mut self.nodes[i])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.position(id).is_some()
    }

    pub fn find_by_address(&self, address: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.address == address)
    }

    /// Deep copy for validation
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    fn position(&self, id: NodeId) -> Option<usize> {
        self.nodes.binary_search_by_key(&id, |n| n.id).ok()
    }

    // === Mutation ===
    //
    // These enforce structural invariants only. Input rules (empty or
    // duplicate addresses, mode restrictions) live at the action boundary.

    /// Add a node, returning its id
    pub fn insert_node(&mut self, address: impl Into<String>, value: i64, pos: Vec2) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        // Ids grow monotonically so pushing keeps the order
        self.nodes.push(Node::new(id, address, value, pos));
        id
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let i = self.position(id)?;
        let node = self.nodes.remove(i);
        let doomed: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|e| e.from == id || e.to == id)
            .map(|e| e.id)
            .collect();
        for edge in doomed {
            self.remove_edge(edge);
        }
        Some(node)
    }

    /// Remove a node that entered the portal. Its edges stay until pruned so
    /// the line to its successor does not vanish before the successor leaves.
    pub fn extract_node(&mut self, id: NodeId) -> Option<Node> {
        let i = self.position(id)?;
        Some(self.nodes.remove(i))
    }

    /// Link `from -> to`. In doubly mode the mirrored `prev` edge is added in
    /// the same call. Returns the `next` edge id.
    ///
    /// Callers check endpoints and the one-next-per-node rule first.
    pub fn link(&mut self, from: NodeId, to: NodeId) -> EdgeId {
        let next = self.push_edge(from, to, EdgeKind::Next);
        if self.link_mode == LinkMode::Doubly {
            self.push_edge(to, from, EdgeKind::Prev);
        }
        next
    }

    /// Remove the `next` edge leaving `from` (and its mirror). Returns the old target.
    pub fn unlink(&mut self, from: NodeId) -> Option<NodeId> {
        let edge = *self
            .edges
            .iter()
            .find(|e| e.from == from && e.kind == EdgeKind::Next)?;
        self.remove_edge(edge.id);
        Some(edge.to)
    }

    /// Remove one edge. Removing either half of a doubly pair removes both.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let i = self.edges.iter().position(|e| e.id == id)?;
        let edge = self.edges.remove(i);
        self.index.remove(&edge);

        if self.link_mode == LinkMode::Doubly {
            let (from, to, kind) = match edge.kind {
                EdgeKind::Next => (edge.to, edge.from, EdgeKind::Prev),
                EdgeKind::Prev => (edge.to, edge.from, EdgeKind::Next),
            };
            if let Some(j) = self
                .edges
                .iter()
                .position(|e| e.from == from && e.to == to && e.kind == kind)
            {
                let mirror = self.edges.remove(j);
                self.index.remove(&mirror);
            }
        }
        Some(edge)
    }

    /// Drop edges whose endpoints satisfy `pred` on both ends
    pub fn remove_edges_where(&mut self, mut pred: impl FnMut(NodeId) -> bool) -> usize {
        let doomed: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|e| pred(e.from) && pred(e.to))
            .map(|e| e.id)
            .collect();
        let before = self.edges.len();
        for id in doomed {
            self.remove_edge(id);
        }
        before - self.edges.len()
    }

    /// Drop edges with a missing endpoint, restoring the endpoint invariant
    pub fn prune_dangling(&mut self) -> usize {
        let doomed: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|e| !self.contains(e.from) || !self.contains(e.to))
            .map(|e| e.id)
            .collect();
        let before = self.edges.len();
        for id in doomed {
            self.remove_edge(id);
        }
        before - self.edges.len()
    }

    /// Remove everything (exercise switch)
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.index = GraphIndex::default();
    }

    /// Clear a flag on every node
    pub fn clear_flags(&mut self, mut f: impl FnMut(&mut NodeFlags)) {
        for node in &mut self.nodes {
            f(&mut node.flags);
        }
    }

    fn push_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        let edge = Edge { id, from, to, kind };
        self.index.insert(&edge);
        self.edges.push(edge);
        id
    }

    /// Ensure nodes and edges are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.nodes.sort_by_key(|n| n.id);
        self.edges.sort_by_key(|e| e.id);
    }
}
