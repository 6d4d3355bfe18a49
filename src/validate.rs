//! Validation Engine
//!
//! Scores a frozen submission against the exercise's expected list. Checks run
//! in a fixed order, each worth `CHECK_POINTS`, and stop at the first failure
//! so the message always names a single root cause:
//!
//! 1. node count
//! 2. value multiset
//! 3. value to address mapping
//! 4. connections: no more than `len - 1` next pointers, nothing points at
//!    the head, the tail points nowhere
//! 5. structure: every consecutive pair linked exactly once, no shortcuts,
//!    and (doubly mode) every next pointer mirrored by a prev pointer
//!
//! A non-empty portal entry order adds a bonus check that never affects
//! pass/fail.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::consts::CHECK_POINTS;
use crate::error::ValidationError;
use crate::settings::LinkMode;
use crate::sim::{Edge, EdgeKind, Node, NodeId};

/// Scored checks, excluding the entry-order bonus
const BASE_CHECKS: u32 = 5;

/// One element of the target list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedNode {
    pub value: i64,
    pub address: String,
}

impl ExpectedNode {
    pub fn new(value: i64, address: impl Into<String>) -> Self {
        Self {
            value,
            address: address.into(),
        }
    }
}

/// The list an exercise asks for, head first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedStructure {
    nodes: Vec<ExpectedNode>,
}

impl ExpectedStructure {
    pub fn new(nodes: Vec<ExpectedNode>) -> Self {
        Self { nodes }
    }

    /// Build from a value sequence and a value-to-address table, the shape
    /// exercise generators produce. `None` if a value has no address.
    pub fn from_sequence(values: &[i64], addresses: &HashMap<i64, String>) -> Option<Self> {
        let nodes = values
            .iter()
            .map(|v| addresses.get(v).map(|a| ExpectedNode::new(*v, a.clone())))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Head-to-tail order
    pub fn traversal(&self) -> &[ExpectedNode] {
        &self.nodes
    }

    pub fn values(&self) -> Vec<i64> {
        self.nodes.iter().map(|n| n.value).collect()
    }

    pub fn address_of(&self, value: i64) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.value == value)
            .map(|n| n.address.as_str())
    }

    pub fn position_of(&self, value: i64) -> Option<usize> {
        self.nodes.iter().position(|n| n.value == value)
    }
}

/// Outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_correct: bool,
    pub score: u32,
    pub total_points: u32,
    pub message: String,
    pub details: Vec<String>,
}

impl ValidationResult {
    fn new(total_points: u32) -> Self {
        Self {
            is_correct: false,
            score: 0,
            total_points,
            message: String::new(),
            details: Vec::new(),
        }
    }

    /// Returned when there is nothing to validate against
    pub fn not_ready() -> Self {
        Self {
            message: "System not ready".to_string(),
            details: vec!["Please try again in a moment.".to_string()],
            ..Self::new(BASE_CHECKS * CHECK_POINTS)
        }
    }

    fn unable(total_points: u32) -> Self {
        Self {
            message: "Unable to validate submission".to_string(),
            details: vec!["Please try submitting again.".to_string()],
            ..Self::new(total_points)
        }
    }

    fn fail(mut self, failure: Failure) -> Self {
        self.message = failure.message.to_string();
        self.details = vec![failure.detail];
        self
    }

    /// Number of scored checks that passed
    pub fn checks_passed(&self) -> u32 {
        self.score / CHECK_POINTS
    }
}

/// A failed check: headline plus one explanatory line
#[derive(Debug)]
struct Failure {
    message: &'static str,
    detail: String,
}

impl Failure {
    fn new(message: &'static str, detail: String) -> Self {
        Self { message, detail }
    }
}

/// Score a submission.
///
/// `entry_order` holds node ids in the order they entered the portal.
/// `expected` is `None` when no exercise is loaded. Never panics on bad
/// input; internal faults come back as a failed result.
pub fn validate(
    nodes: &[Node],
    edges: &[Edge],
    entry_order: Option<&[NodeId]>,
    expected: Option<&ExpectedStructure>,
    link_mode: LinkMode,
) -> ValidationResult {
    let entry_order = entry_order.filter(|order| !order.is_empty());
    let total_points = match entry_order {
        Some(_) => (BASE_CHECKS + 1) * CHECK_POINTS,
        None => BASE_CHECKS * CHECK_POINTS,
    };

    let outcome = expected
        .filter(|e| !e.is_empty())
        .ok_or(ValidationError::NoExercise)
        .and_then(|expected| score(nodes, edges, entry_order, expected, link_mode, total_points));

    match outcome {
        Ok(result) => {
            log::info!(
                "validation: {} ({}/{})",
                result.message,
                result.score,
                result.total_points
            );
            result
        }
        Err(ValidationError::NoExercise) => {
            log::warn!("validation requested with no exercise loaded");
            ValidationResult::not_ready()
        }
        Err(err) => {
            log::warn!("validation fault: {err}");
            ValidationResult::unable(total_points)
        }
    }
}

fn score(
    nodes: &[Node],
    edges: &[Edge],
    entry_order: Option<&[NodeId]>,
    expected: &ExpectedStructure,
    link_mode: LinkMode,
    total_points: u32,
) -> Result<ValidationResult, ValidationError> {
    let mut seen = HashSet::new();
    if let Some(dup) = expected.traversal().iter().find(|n| !seen.insert(n.value)) {
        return Err(ValidationError::AmbiguousValue(dup.value));
    }

    let mut result = ValidationResult::new(total_points);

    for check in [check_count, check_values, check_addresses] {
        if let Err(failure) = check(nodes, expected) {
            return Ok(result.fail(failure));
        }
        result.score += CHECK_POINTS;
    }

    // Values are now a permutation of the expected ones, so each expected
    // position maps to exactly one submitted node
    let submission = Submission::new(nodes, edges, expected)?;

    if let Err(failure) = submission.check_connections() {
        return Ok(result.fail(failure));
    }
    result.score += CHECK_POINTS;

    if let Err(failure) = submission.check_structure(link_mode) {
        return Ok(result.fail(failure));
    }
    result.score += CHECK_POINTS;

    result.is_correct = true;
    let chain = expected
        .values()
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(" → ");
    result.details = vec![
        format!("Correct values: [{chain}]"),
        "Correct addresses".to_string(),
        "Perfect structure".to_string(),
        "All connections valid".to_string(),
    ];

    match entry_order {
        Some(order) => match submission.check_entry_order(order) {
            Ok(()) => {
                result.score += CHECK_POINTS;
                result.message =
                    "Perfect! Your linked list is correct and entered the portal in proper order!".to_string();
                result.details.push("Perfect portal entry order!".to_string());
            }
            Err(failure) => {
                result.message = "Linked list is correct but portal entry order was wrong!".to_string();
                result.details.push(failure.detail);
            }
        },
        None => {
            result.message = "Perfect! Your linked list is completely correct!".to_string();
        }
    }

    Ok(result)
}

fn check_count(nodes: &[Node], expected: &ExpectedStructure) -> Result<(), Failure> {
    if nodes.len() == expected.len() {
        return Ok(());
    }
    Err(Failure::new(
        "Wrong number of nodes!",
        format!("Expected {} nodes, but found {} nodes.", expected.len(), nodes.len()),
    ))
}

fn check_values(nodes: &[Node], expected: &ExpectedStructure) -> Result<(), Failure> {
    let mut found: Vec<i64> = nodes.iter().map(|n| n.value).collect();
    let mut wanted = expected.values();
    found.sort_unstable();
    wanted.sort_unstable();
    if found == wanted {
        return Ok(());
    }
    Err(Failure::new(
        "Incorrect node values!",
        format!("Expected values: [{}], but found: [{}]", join(&wanted), join(&found)),
    ))
}

fn check_addresses(nodes: &[Node], expected: &ExpectedStructure) -> Result<(), Failure> {
    for node in nodes {
        match expected.address_of(node.value) {
            None => {
                return Err(Failure::new(
                    "Unexpected value found!",
                    format!("Value {} is not part of this exercise.", node.value),
                ));
            }
            Some(address) if address != node.address => {
                return Err(Failure::new(
                    "Wrong address mapping!",
                    format!(
                        "Value {} should have address \"{address}\", but has \"{}\".",
                        node.value, node.address
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn join(values: &[i64]) -> String {
    values.iter().map(i64::to_string).collect::<Vec<_>>().join(", ")
}

/// Submitted graph resolved against expected positions
struct Submission<'a> {
    nodes: &'a [Node],
    edges: &'a [Edge],
    expected: &'a ExpectedStructure,
    /// Submitted node at each expected position
    ids: Vec<NodeId>,
    /// Expected position of each submitted node
    positions: HashMap<NodeId, usize>,
}

impl<'a> Submission<'a> {
    fn new(nodes: &'a [Node], edges: &'a [Edge], expected: &'a ExpectedStructure) -> Result<Self, ValidationError> {
        let ids = expected
            .traversal()
            .iter()
            .map(|e| {
                nodes
                    .iter()
                    .find(|n| n.value == e.value)
                    .map(|n| n.id)
                    .ok_or(ValidationError::MissingValue(e.value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let positions = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        Ok(Self {
            nodes,
            edges,
            expected,
            ids,
            positions,
        })
    }

    fn next_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(|e| e.kind == EdgeKind::Next)
    }

    fn value_of(&self, id: NodeId) -> String {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map_or_else(|| "unknown".to_string(), |n| n.value.to_string())
    }

    fn head(&self) -> (NodeId, i64) {
        (self.ids[0], self.expected.traversal()[0].value)
    }

    fn tail(&self) -> (NodeId, i64) {
        let last = self.ids.len() - 1;
        (self.ids[last], self.expected.traversal()[last].value)
    }

    /// Check 4
    fn check_connections(&self) -> Result<(), Failure> {
        let allowed = self.expected.len() - 1;
        let found = self.next_edges().count();
        if found > allowed {
            return Err(Failure::new(
                "Wrong number of connections!",
                format!("Expected {allowed} connections, but found {found} connections."),
            ));
        }

        let (head, head_value) = self.head();
        if self.next_edges().any(|e| e.to == head) {
            return Err(Failure::new(
                "Head node error!",
                format!("The first node ({head_value}) should not have any incoming connections."),
            ));
        }

        let (tail, tail_value) = self.tail();
        if self.next_edges().any(|e| e.from == tail) {
            return Err(Failure::new(
                "Tail node error!",
                format!("The last node ({tail_value}) should not have any outgoing connections."),
            ));
        }
        Ok(())
    }

    /// Check 5
    fn check_structure(&self, link_mode: LinkMode) -> Result<(), Failure> {
        let len = self.expected.len();
        if len > 1 {
            let (head, head_value) = self.head();
            if !self.next_edges().any(|e| e.from == head) {
                return Err(Failure::new(
                    "Head node error!",
                    format!("The first node ({head_value}) should have an outgoing connection to the next node."),
                ));
            }
            let (tail, tail_value) = self.tail();
            if !self.next_edges().any(|e| e.to == tail) {
                return Err(Failure::new(
                    "Tail node error!",
                    format!("The last node ({tail_value}) should have an incoming connection from the previous node."),
                ));
            }
        }

        let traversal = self.expected.traversal();
        for i in 0..len.saturating_sub(1) {
            let (from, to) = (self.ids[i], self.ids[i + 1]);
            let links = self.next_edges().filter(|e| e.from == from && e.to == to).count();
            if links != 1 {
                let (a, b) = (&traversal[i], &traversal[i + 1]);
                return Err(Failure::new(
                    "Missing connection!",
                    format!(
                        "Expected connection from {} ({}) to {} ({}).",
                        a.value, a.address, b.value, b.address
                    ),
                ));
            }
        }

        for edge in self.next_edges() {
            let consecutive = match (self.positions.get(&edge.from), self.positions.get(&edge.to)) {
                (Some(from), Some(to)) => *to == from + 1,
                _ => false,
            };
            if !consecutive {
                return Err(Failure::new(
                    "Invalid connection!",
                    format!(
                        "Found unexpected connection from {} to {}. Only sequential connections are allowed.",
                        self.value_of(edge.from),
                        self.value_of(edge.to)
                    ),
                ));
            }
        }

        if link_mode == LinkMode::Doubly {
            self.check_mirrors()?;
        }
        Ok(())
    }

    /// Every next pointer has its prev pointer and vice versa
    fn check_mirrors(&self) -> Result<(), Failure> {
        let has = |from: NodeId, to: NodeId, kind: EdgeKind| {
            self.edges.iter().any(|e| e.from == from && e.to == to && e.kind == kind)
        };
        for edge in self.next_edges() {
            if !has(edge.to, edge.from, EdgeKind::Prev) {
                return Err(Failure::new(
                    "Missing connection!",
                    format!(
                        "Expected a previous pointer from {} back to {}.",
                        self.value_of(edge.to),
                        self.value_of(edge.from)
                    ),
                ));
            }
        }
        for edge in self.edges.iter().filter(|e| e.kind == EdgeKind::Prev) {
            if !has(edge.to, edge.from, EdgeKind::Next) {
                return Err(Failure::new(
                    "Invalid connection!",
                    format!(
                        "Found a previous pointer from {} to {} with no matching next pointer.",
                        self.value_of(edge.from),
                        self.value_of(edge.to)
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Bonus: nodes entered the portal head first
    fn check_entry_order(&self, order: &[NodeId]) -> Result<(), Failure> {
        if order.len() != self.ids.len() {
            return Err(Failure::new(
                "Wrong portal entry order!",
                format!(
                    "Expected {} nodes to enter portal, but {} entered",
                    self.ids.len(),
                    order.len()
                ),
            ));
        }
        for (i, (got, want)) in order.iter().zip(&self.ids).enumerate() {
            if got != want {
                return Err(Failure::new(
                    "Wrong portal entry order!",
                    format!(
                        "Wrong portal entry order! Expected {} at position {}, but got {}",
                        self.value_of(*want),
                        i + 1,
                        self.value_of(*got)
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Non-scoring summary of how far along a build is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub nodes_created: usize,
    pub expected_nodes: usize,
    pub connections_created: usize,
    pub expected_connections: usize,
    pub correct_values: usize,
    pub correct_addresses: usize,
    pub has_valid_structure: bool,
}

/// Progress of the live world toward the expected list
pub fn progress_report(
    nodes: &[Node],
    edges: &[Edge],
    expected: &ExpectedStructure,
    link_mode: LinkMode,
) -> ProgressReport {
    let next_count = edges.iter().filter(|e| e.kind == EdgeKind::Next).count();
    let expected_connections = expected.len().saturating_sub(1);
    let mut report = ProgressReport {
        nodes_created: nodes.len(),
        expected_nodes: expected.len(),
        connections_created: next_count,
        expected_connections,
        correct_values: nodes
            .iter()
            .filter(|n| expected.position_of(n.value).is_some())
            .count(),
        correct_addresses: nodes
            .iter()
            .filter(|n| expected.address_of(n.value) == Some(n.address.as_str()))
            .count(),
        has_valid_structure: false,
    };

    if !expected.is_empty()
        && nodes.len() == expected.len()
        && next_count == expected_connections
        && check_values(nodes, expected).is_ok()
    {
        if let Ok(submission) = Submission::new(nodes, edges, expected) {
            report.has_valid_structure =
                submission.check_connections().is_ok() && submission.check_structure(link_mode).is_ok();
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn expected(pairs: &[(i64, &str)]) -> ExpectedStructure {
        ExpectedStructure::new(pairs.iter().map(|(v, a)| ExpectedNode::new(*v, *a)).collect())
    }

    fn nodes(pairs: &[(i64, &str)]) -> Vec<Node> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (v, a))| Node::new(NodeId(i as u32 + 1), *a, *v, Vec2::ZERO))
            .collect()
    }

    fn edge(id: u32, from: u32, to: u32) -> Edge {
        Edge {
            id: crate::sim::EdgeId(id),
            from: NodeId(from),
            to: NodeId(to),
            kind: EdgeKind::Next,
        }
    }

    fn chain_edges(n: u32) -> Vec<Edge> {
        (1..n).map(|i| edge(i, i, i + 1)).collect()
    }

    const AB: [(i64, &str); 2] = [(10, "ab7"), (20, "cc30")];
    const ABC: [(i64, &str); 3] = [(10, "ab7"), (20, "cc30"), (30, "f00")];

    #[test]
    fn test_scenario_a_correct_pair() {
        let result = validate(&nodes(&AB), &[edge(1, 1, 2)], None, Some(&expected(&AB)), LinkMode::Singly);
        assert!(result.is_correct);
        assert_eq!(result.score, 100);
        assert_eq!(result.total_points, 100);
    }

    #[test]
    fn test_scenario_b_reversed_edge() {
        let result = validate(&nodes(&AB), &[edge(1, 2, 1)], None, Some(&expected(&AB)), LinkMode::Singly);
        assert!(!result.is_correct);
        assert_eq!(result.score, 60);
        assert_eq!(result.message, "Head node error!");
    }

    #[test]
    fn test_scenario_c_wrong_entry_order() {
        let order = [NodeId(3), NodeId(2), NodeId(1)];
        let result = validate(
            &nodes(&ABC),
            &chain_edges(3),
            Some(&order),
            Some(&expected(&ABC)),
            LinkMode::Singly,
        );
        assert!(result.is_correct);
        assert_eq!(result.score, 100);
        assert_eq!(result.total_points, 120);
        assert!(result.message.contains("portal entry order was wrong"));
        assert!(result.details.last().unwrap().contains("Expected 10 at position 1, but got 30"));
    }

    #[test]
    fn test_correct_entry_order_earns_bonus() {
        let order = [NodeId(1), NodeId(2), NodeId(3)];
        let result = validate(
            &nodes(&ABC),
            &chain_edges(3),
            Some(&order),
            Some(&expected(&ABC)),
            LinkMode::Singly,
        );
        assert!(result.is_correct);
        assert_eq!(result.score, 120);
    }

    #[test]
    fn test_scenario_d_extra_node() {
        let mut submitted = nodes(&ABC);
        submitted.push(Node::new(NodeId(9), "zz", 99, Vec2::ZERO));
        let result = validate(&submitted, &chain_edges(3), None, Some(&expected(&ABC)), LinkMode::Singly);
        assert!(!result.is_correct);
        assert_eq!(result.score, 0);
        assert_eq!(result.message, "Wrong number of nodes!");
    }

    #[test]
    fn test_missing_edge_scores_eighty() {
        let mut edges = chain_edges(3);
        edges.remove(1);
        let result = validate(&nodes(&ABC), &edges, None, Some(&expected(&ABC)), LinkMode::Singly);
        assert!(!result.is_correct);
        assert_eq!(result.score, 80);
    }

    #[test]
    fn test_singleton_without_edges_is_correct() {
        let one = [(5, "x1")];
        let result = validate(&nodes(&one), &[], None, Some(&expected(&one)), LinkMode::Singly);
        assert!(result.is_correct);
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_wrong_values_and_addresses() {
        let wrong_value = [(10, "ab7"), (21, "cc30")];
        let result = validate(&nodes(&wrong_value), &[edge(1, 1, 2)], None, Some(&expected(&AB)), LinkMode::Singly);
        assert_eq!(result.score, 20);
        assert_eq!(result.message, "Incorrect node values!");

        let wrong_address = [(10, "ab7"), (20, "zz")];
        let result =
            validate(&nodes(&wrong_address), &[edge(1, 1, 2)], None, Some(&expected(&AB)), LinkMode::Singly);
        assert_eq!(result.score, 40);
        assert_eq!(result.message, "Wrong address mapping!");
    }

    #[test]
    fn test_too_many_edges() {
        let mut edges = chain_edges(3);
        edges.push(edge(9, 1, 3));
        let result = validate(&nodes(&ABC), &edges, None, Some(&expected(&ABC)), LinkMode::Singly);
        assert_eq!(result.score, 60);
        assert_eq!(result.message, "Wrong number of connections!");
    }

    #[test]
    fn test_shortcut_is_invalid() {
        let edges = vec![edge(1, 1, 2), edge(2, 1, 3)];
        let result = validate(&nodes(&ABC), &edges, None, Some(&expected(&ABC)), LinkMode::Singly);
        assert_eq!(result.score, 80);
        assert_eq!(result.message, "Missing connection!");
    }

    #[test]
    fn test_no_exercise_is_not_ready() {
        let result = validate(&nodes(&AB), &[edge(1, 1, 2)], None, None, LinkMode::Singly);
        assert!(!result.is_correct);
        assert_eq!(result.score, 0);
        assert_eq!(result.message, "System not ready");
    }

    #[test]
    fn test_ambiguous_exercise_is_reported_not_thrown() {
        let dup = [(10, "a"), (10, "b")];
        let result = validate(&nodes(&dup), &[edge(1, 1, 2)], None, Some(&expected(&dup)), LinkMode::Singly);
        assert!(!result.is_correct);
        assert_eq!(result.message, "Unable to validate submission");
    }

    #[test]
    fn test_doubly_requires_mirrored_pointers() {
        let mut edges = chain_edges(3);
        let exercise = expected(&ABC);

        let result = validate(&nodes(&ABC), &edges, None, Some(&exercise), LinkMode::Doubly);
        assert_eq!(result.score, 80);

        edges.push(Edge { kind: EdgeKind::Prev, ..edge(10, 2, 1) });
        edges.push(Edge { kind: EdgeKind::Prev, ..edge(11, 3, 2) });
        let result = validate(&nodes(&ABC), &edges, None, Some(&exercise), LinkMode::Doubly);
        assert!(result.is_correct);
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_from_sequence_needs_every_address() {
        let addresses = HashMap::from([(1, "a".to_string()), (2, "b".to_string())]);
        let exercise = ExpectedStructure::from_sequence(&[2, 1], &addresses).unwrap();
        assert_eq!(exercise.values(), vec![2, 1]);
        assert_eq!(exercise.address_of(1), Some("a"));
        assert!(ExpectedStructure::from_sequence(&[3], &addresses).is_none());
    }

    #[test]
    fn test_progress_report() {
        let exercise = expected(&ABC);
        let partial = nodes(&[(10, "ab7"), (20, "wrong")]);
        let report = progress_report(&partial, &[edge(1, 1, 2)], &exercise, LinkMode::Singly);
        assert_eq!(report.nodes_created, 2);
        assert_eq!(report.expected_nodes, 3);
        assert_eq!(report.expected_connections, 2);
        assert_eq!(report.correct_values, 2);
        assert_eq!(report.correct_addresses, 1);
        assert!(!report.has_valid_structure);

        let report = progress_report(&nodes(&ABC), &chain_edges(3), &exercise, LinkMode::Singly);
        assert!(report.has_valid_structure);
    }
}
