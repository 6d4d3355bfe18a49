//! Graph queries over the world: heads, tails, chains and components
//!
//! `GraphIndex` is updated on every edge insert/remove, so role queries are
//! map lookups instead of edge scans each frame. Head/tail/chain queries
//! follow `next` edges only; components treat every edge as undirected.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::state::{Edge, EdgeKind, NodeId, World};

/// Where a node sits in its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// No `next` edges at all. Head and tail at once.
    Isolated,
    Head,
    Tail,
    Middle,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Isolated => "head/tail",
            NodeRole::Head => "head",
            NodeRole::Tail => "tail",
            NodeRole::Middle => "middle",
        }
    }
}

/// Adjacency cache kept in sync with the world's edge list
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    /// `next` targets per node (more than one only in a malformed submission)
    outgoing: HashMap<NodeId, Vec<NodeId>>,
    /// `next` sources per node
    incoming: HashMap<NodeId, Vec<NodeId>>,
    /// Every edge, both directions, with multiplicity
    undirected: HashMap<NodeId, Vec<NodeId>>,
}

impl GraphIndex {
    /// Build from scratch (snapshots, deserialized worlds, submissions)
    pub fn build(edges: &[Edge]) -> Self {
        let mut index = Self::default();
        for edge in edges {
            index.insert(edge);
        }
        index
    }

    pub(crate) fn insert(&mut self, edge: &Edge) {
        if edge.kind == EdgeKind::Next {
            self.outgoing.entry(edge.from).or_default().push(edge.to);
            self.incoming.entry(edge.to).or_default().push(edge.from);
        }
        self.undirected.entry(edge.from).or_default().push(edge.to);
        self.undirected.entry(edge.to).or_default().push(edge.from);
    }

    pub(crate) fn remove(&mut self, edge: &Edge) {
        if edge.kind == EdgeKind::Next {
            remove_one(&mut self.outgoing, edge.from, edge.to);
            remove_one(&mut self.incoming, edge.to, edge.from);
        }
        remove_one(&mut self.undirected, edge.from, edge.to);
        remove_one(&mut self.undirected, edge.to, edge.from);
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.outgoing.get(&id).map_or(0, Vec::len)
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.incoming.get(&id).map_or(0, Vec::len)
    }

    /// Whether any edge (either kind) touches the node
    pub fn has_edges(&self, id: NodeId) -> bool {
        self.undirected.get(&id).is_some_and(|v| !v.is_empty())
    }

    /// First `next` target
    pub fn next_of(&self, id: NodeId) -> Option<NodeId> {
        self.outgoing.get(&id).and_then(|v| v.first().copied())
    }

    /// First `next` source
    pub fn prev_of(&self, id: NodeId) -> Option<NodeId> {
        self.incoming.get(&id).and_then(|v| v.first().copied())
    }

    /// Has an outgoing `next` edge and no incoming one
    pub fn is_head(&self, id: NodeId) -> bool {
        self.out_degree(id) > 0 && self.in_degree(id) == 0
    }

    /// Has an incoming `next` edge and no outgoing one
    pub fn is_tail(&self, id: NodeId) -> bool {
        self.in_degree(id) > 0 && self.out_degree(id) == 0
    }

    pub fn role(&self, id: NodeId) -> NodeRole {
        match (self.in_degree(id) > 0, self.out_degree(id) > 0) {
            (false, false) => NodeRole::Isolated,
            (false, true) => NodeRole::Head,
            (true, false) => NodeRole::Tail,
            (true, true) => NodeRole::Middle,
        }
    }

    /// Ordered head-to-tail chain through `start`.
    ///
    /// A non-head start walks backward until a head or a node with no
    /// predecessor; the walk forward stops at a node with no `next` or at a
    /// repeat, so cycles terminate.
    pub fn chain_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut head = start;
        if !self.is_head(start) {
            let mut seen = HashSet::from([start]);
            while let Some(prev) = self.prev_of(head) {
                if !seen.insert(prev) {
                    break;
                }
                head = prev;
                if self.is_head(prev) {
                    break;
                }
            }
        }

        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(head);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            chain.push(id);
            current = self.next_of(id);
        }
        chain
    }

    /// Every node reachable from `id` ignoring edge direction, in BFS order
    pub fn connected_component(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::from([id]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            order.push(current);
            if let Some(neighbors) = self.undirected.get(&current) {
                // Sorted for deterministic traversal
                let sorted: BTreeSet<NodeId> = neighbors.iter().copied().collect();
                for next in sorted {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        order
    }
}

fn remove_one(map: &mut HashMap<NodeId, Vec<NodeId>>, key: NodeId, value: NodeId) {
    if let Some(list) = map.get_mut(&key) {
        if let Some(i) = list.iter().position(|v| *v == value) {
            list.swap_remove(i);
        }
        if list.is_empty() {
            map.remove(&key);
        }
    }
}

// === World-level queries (node existence aware) ===

impl World {
    pub fn is_head(&self, id: NodeId) -> bool {
        self.contains(id) && self.graph().is_head(id)
    }

    pub fn is_tail(&self, id: NodeId) -> bool {
        self.contains(id) && self.graph().is_tail(id)
    }

    /// Role of a live node
    pub fn role(&self, id: NodeId) -> Option<NodeRole> {
        self.contains(id).then(|| self.graph().role(id))
    }

    pub fn chain_order(&self, start: NodeId) -> Vec<NodeId> {
        if !self.contains(start) {
            return Vec::new();
        }
        self.graph().chain_order(start)
    }

    pub fn connected_component(&self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.graph().connected_component(id)
    }

    pub fn heads(&self) -> Vec<NodeId> {
        self.nodes()
            .iter()
            .map(|n| n.id)
            .filter(|&id| self.graph().is_head(id))
            .collect()
    }

    pub fn tails(&self) -> Vec<NodeId> {
        self.nodes()
            .iter()
            .map(|n| n.id)
            .filter(|&id| self.graph().is_tail(id))
            .collect()
    }

    /// Nodes with no edges of any kind
    pub fn isolated(&self) -> Vec<NodeId> {
        self.nodes()
            .iter()
            .map(|n| n.id)
            .filter(|&id| !self.graph().has_edges(id))
            .collect()
    }

    /// Connected components of live nodes, ordered by their smallest id
    pub fn components(&self) -> Vec<Vec<NodeId>> {
        let mut seen = HashSet::new();
        let mut components = Vec::new();
        for node in self.nodes() {
            if seen.contains(&node.id) {
                continue;
            }
            let component: Vec<NodeId> = self
                .graph()
                .connected_component(node.id)
                .into_iter()
                .filter(|id| self.contains(*id))
                .collect();
            seen.extend(component.iter().copied());
            components.push(component);
        }
        components
    }

    /// Best chain to drain first in a component: from its first head, or
    /// from its smallest id when it has no head (isolated node or cycle)
    pub fn component_chain(&self, component: &[NodeId]) -> Vec<NodeId> {
        let start = component
            .iter()
            .copied()
            .filter(|&id| self.graph().is_head(id))
            .min()
            .or_else(|| component.iter().copied().min());
        match start {
            Some(id) => self
                .chain_order(id)
                .into_iter()
                .filter(|id| self.contains(*id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The list queue operations act on: the chain of the first head, or
    /// the first isolated node when nothing is linked yet
    pub fn primary_chain(&self) -> Vec<NodeId> {
        if let Some(head) = self.heads().first() {
            return self.chain_order(*head);
        }
        self.isolated().first().map(|id| vec![*id]).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LinkMode;
    use glam::Vec2;

    fn chain(mode: LinkMode, n: usize) -> (World, Vec<NodeId>) {
        let mut world = World::new(mode);
        let ids: Vec<NodeId> = (0..n)
            .map(|i| world.insert_node(format!("n{i}"), i as i64, Vec2::new(80.0 * i as f32, 300.0)))
            .collect();
        for pair in ids.windows(2) {
            world.link(pair[0], pair[1]);
        }
        (world, ids)
    }

    #[test]
    fn test_head_tail_roles() {
        let (world, ids) = chain(LinkMode::Singly, 3);
        assert!(world.is_head(ids[0]));
        assert!(world.is_tail(ids[2]));
        assert_eq!(world.role(ids[1]), Some(NodeRole::Middle));
        assert!(!world.is_head(ids[1]) && !world.is_tail(ids[1]));
    }

    #[test]
    fn test_singleton_is_head_and_tail() {
        let mut world = World::default();
        let id = world.insert_node("solo", 7, Vec2::ZERO);
        assert_eq!(world.role(id), Some(NodeRole::Isolated));
        assert_eq!(NodeRole::Isolated.as_str(), "head/tail");
        assert_eq!(world.chain_order(id), vec![id]);
        assert_eq!(world.primary_chain(), vec![id]);
    }

    #[test]
    fn test_chain_order_from_middle_walks_back_to_head() {
        let (world, ids) = chain(LinkMode::Singly, 5);
        assert_eq!(world.chain_order(ids[3]), ids);
        assert_eq!(world.chain_order(ids[0]), ids);
    }

    #[test]
    fn test_chain_order_terminates_on_cycle() {
        let (mut world, ids) = chain(LinkMode::Singly, 3);
        world.link(ids[2], ids[0]);
        let order = world.chain_order(ids[1]);
        assert_eq!(order.len(), 3);
        let unique: HashSet<_> = order.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_doubly_prev_edges_do_not_change_roles() {
        let (world, ids) = chain(LinkMode::Doubly, 3);
        assert_eq!(world.edges().len(), 4);
        assert!(world.is_head(ids[0]));
        assert!(world.is_tail(ids[2]));
        assert_eq!(world.chain_order(ids[2]), ids);
    }

    #[test]
    fn test_connected_component_is_undirected() {
        let (mut world, ids) = chain(LinkMode::Singly, 3);
        let other = world.insert_node("x", 99, Vec2::ZERO);
        let mut component = world.connected_component(ids[2]);
        component.sort();
        assert_eq!(component, ids);
        assert_eq!(world.connected_component(other), vec![other]);
        assert_eq!(world.components().len(), 2);
    }

    #[test]
    fn test_index_follows_unlink() {
        let (mut world, ids) = chain(LinkMode::Doubly, 3);
        assert_eq!(world.unlink(ids[1]), Some(ids[2]));
        assert!(world.is_tail(ids[1]));
        assert_eq!(world.role(ids[2]), Some(NodeRole::Isolated));
        assert_eq!(world.edges().len(), 2);
    }
}
