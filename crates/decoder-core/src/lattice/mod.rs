//! Word lattices: a DAG of (word, time span) nodes joined by scored edges.
//!
//! Nodes and edges live in ordered maps keyed by stable ids, so iteration
//! order (and therefore every dump) is deterministic. Every edge is listed in
//! the leaving edges of its source and the entering edges of its target;
//! `check_consistency` verifies that.

mod build;
mod io;
mod nbest;
mod optimizer;
mod posterior;
mod slf;
mod viz;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::logmath::{LogMath, LOG_ZERO};
use crate::search::Word;

pub use nbest::{BoundedPriorityQueue, Nbest, NbestPath};
pub use optimizer::{LatticeOptimizer, OptimizeStats};
pub use posterior::WordResult;
pub use slf::SlfOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u32);

#[derive(Debug, thiserror::Error)]
pub enum LatticeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("unknown node {0}")]
    UnknownNode(String),
    #[error("lattice has no initial node")]
    MissingInitialNode,
    #[error("lattice has no terminal node")]
    MissingTerminalNode,
    #[error("inconsistent lattice: {0}")]
    Inconsistent(String),
    #[error("lattice contains a cycle through node {0}")]
    Cycle(NodeId),
    #[error("cannot build a lattice: {0}")]
    Empty(&'static str),
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    word: Word,
    begin_time: usize,
    end_time: usize,
    entering: Vec<EdgeId>,
    leaving: Vec<EdgeId>,
    forward_score: f32,
    backward_score: f32,
    viterbi_score: f32,
    posterior: f32,
    best_predecessor: Option<NodeId>,
}

impl Node {
    fn new(id: NodeId, word: Word, begin_time: usize, end_time: usize) -> Self {
        Self {
            id,
            word,
            begin_time,
            end_time,
            entering: Vec::new(),
            leaving: Vec::new(),
            forward_score: LOG_ZERO,
            backward_score: LOG_ZERO,
            viterbi_score: LOG_ZERO,
            posterior: LOG_ZERO,
            best_predecessor: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn word(&self) -> &Word {
        &self.word
    }

    /// First frame of the word.
    pub fn begin_time(&self) -> usize {
        self.begin_time
    }

    /// Frame at which the word ends.
    pub fn end_time(&self) -> usize {
        self.end_time
    }

    pub fn entering_edges(&self) -> &[EdgeId] {
        &self.entering
    }

    pub fn leaving_edges(&self) -> &[EdgeId] {
        &self.leaving
    }

    pub fn forward_score(&self) -> f32 {
        self.forward_score
    }

    pub fn backward_score(&self) -> f32 {
        self.backward_score
    }

    pub fn viterbi_score(&self) -> f32 {
        self.viterbi_score
    }

    /// Log posterior; `LOG_ONE` means the node is on every path.
    pub fn posterior(&self) -> f32 {
        self.posterior
    }

    pub fn best_predecessor(&self) -> Option<NodeId> {
        self.best_predecessor
    }

    /// Same word over the same time span.
    pub fn is_equivalent(&self, other: &Node) -> bool {
        self.word.spelling() == other.word.spelling()
            && self.begin_time == other.begin_time
            && self.end_time == other.end_time
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    id: EdgeId,
    from: NodeId,
    to: NodeId,
    acoustic_score: f32,
    lm_score: f32,
}

impl Edge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn from_node(&self) -> NodeId {
        self.from
    }

    pub fn to_node(&self) -> NodeId {
        self.to
    }

    pub fn acoustic_score(&self) -> f32 {
        self.acoustic_score
    }

    pub fn lm_score(&self) -> f32 {
        self.lm_score
    }

    /// Combined score with the language model scaled by `language_weight`.
    pub fn score(&self, language_weight: f32) -> f32 {
        self.acoustic_score + self.lm_score * language_weight
    }
}

#[derive(Debug, Clone)]
pub struct Lattice {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    initial: Option<NodeId>,
    terminal: Option<NodeId>,
    log_math: LogMath,
    next_node: u32,
    next_edge: u32,
}

const SCORE_TOLERANCE: f32 = 1e-3;

impl Lattice {
    pub fn new(log_math: LogMath) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            initial: None,
            terminal: None,
            log_math,
            next_node: 0,
            next_edge: 0,
        }
    }

    pub fn log_math(&self) -> &LogMath {
        &self.log_math
    }

    pub fn add_node(&mut self, word: Word, begin_time: usize, end_time: usize) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, Node::new(id, word, begin_time, end_time));
        id
    }

    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        acoustic_score: f32,
        lm_score: f32,
    ) -> Result<EdgeId, LatticeError> {
        for n in [from, to] {
            if !self.nodes.contains_key(&n) {
                return Err(LatticeError::UnknownNode(n.to_string()));
            }
        }
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(
            id,
            Edge {
                id,
                from,
                to,
                acoustic_score,
                lm_score,
            },
        );
        if let Some(node) = self.nodes.get_mut(&from) {
            node.leaving.push(id);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.entering.push(id);
        }
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn initial_node(&self) -> Option<NodeId> {
        self.initial
    }

    pub fn terminal_node(&self) -> Option<NodeId> {
        self.terminal
    }

    pub fn set_initial_node(&mut self, id: NodeId) {
        self.initial = Some(id);
    }

    pub fn set_terminal_node(&mut self, id: NodeId) {
        self.terminal = Some(id);
    }

    pub(crate) fn require_initial(&self) -> Result<NodeId, LatticeError> {
        self.initial
            .filter(|n| self.has_node(*n))
            .ok_or(LatticeError::MissingInitialNode)
    }

    pub(crate) fn require_terminal(&self) -> Result<NodeId, LatticeError> {
        self.terminal
            .filter(|n| self.has_node(*n))
            .ok_or(LatticeError::MissingTerminalNode)
    }

    /// Nodes reached from `id` by its leaving edges.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|n| n.leaving.iter().filter_map(|e| self.edges.get(e)).map(|e| e.to).collect())
            .unwrap_or_default()
    }

    /// Nodes with an edge into `id`.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|n| n.entering.iter().filter_map(|e| self.edges.get(e)).map(|e| e.from).collect())
            .unwrap_or_default()
    }

    /// The first edge from `from` to `to`.
    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.node(from)?
            .leaving
            .iter()
            .copied()
            .find(|e| self.edges.get(e).is_some_and(|e| e.to == to))
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.edge_between(from, to).is_some()
    }

    pub fn remove_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.remove(&id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&edge.from) {
            node.leaving.retain(|&e| e != id);
        }
        if let Some(node) = self.nodes.get_mut(&edge.to) {
            node.entering.retain(|&e| e != id);
        }
    }

    /// Remove `id` and every edge touching it.
    pub fn remove_node_and_edges(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let touching: Vec<EdgeId> = node.entering.iter().chain(&node.leaving).copied().collect();
        for e in touching {
            self.remove_edge(e);
        }
        self.nodes.remove(&id);
        if self.initial == Some(id) {
            self.initial = None;
        }
        if self.terminal == Some(id) {
            self.terminal = None;
        }
    }

    /// Remove `id`, connecting each of its predecessors directly to each of
    /// its successors. Scores along the bypassed node are summed; an
    /// existing edge keeps the better of the two scores.
    pub fn remove_node_and_cross_connect_edges(&mut self, id: NodeId) -> Result<(), LatticeError> {
        let Some(node) = self.nodes.get(&id) else {
            return Ok(());
        };
        let entering: Vec<Edge> = node
            .entering
            .iter()
            .filter_map(|e| self.edges.get(e))
            .cloned()
            .collect();
        let leaving: Vec<Edge> = node
            .leaving
            .iter()
            .filter_map(|e| self.edges.get(e))
            .cloned()
            .collect();
        self.remove_node_and_edges(id);
        for into in &entering {
            for out in &leaving {
                let acoustic = into.acoustic_score + out.acoustic_score;
                let lm = into.lm_score + out.lm_score;
                self.add_or_merge_edge(into.from, out.to, acoustic, lm)?;
            }
        }
        Ok(())
    }

    /// Add an edge, or raise an existing one between the same nodes to the
    /// better of both scores.
    pub(crate) fn add_or_merge_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        acoustic_score: f32,
        lm_score: f32,
    ) -> Result<EdgeId, LatticeError> {
        match self.edge_between(from, to) {
            Some(id) => {
                if let Some(edge) = self.edges.get_mut(&id) {
                    edge.acoustic_score = edge.acoustic_score.max(acoustic_score);
                    edge.lm_score = edge.lm_score.max(lm_score);
                }
                Ok(id)
            }
            None => self.add_edge(from, to, acoustic_score, lm_score),
        }
    }

    /// Bypass every filler node other than the sentence markers.
    pub fn remove_fillers(&mut self) -> Result<usize, LatticeError> {
        let fillers: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| {
                n.word.is_filler()
                    && !n.word.is_sentence_start()
                    && !n.word.is_sentence_end()
                    && Some(n.id) != self.initial
                    && Some(n.id) != self.terminal
            })
            .map(|n| n.id)
            .collect();
        for &id in &fillers {
            self.remove_node_and_cross_connect_edges(id)?;
        }
        Ok(fillers.len())
    }

    /// Every word sequence from the initial to the terminal node, as
    /// space-separated spellings.
    pub fn all_paths(&self) -> Result<Vec<String>, LatticeError> {
        let initial = self.require_initial()?;
        let terminal = self.require_terminal()?;
        let mut paths = Vec::new();
        let mut stack: Vec<(NodeId, Vec<NodeId>)> = vec![(initial, vec![initial])];
        while let Some((node, path)) = stack.pop() {
            if node == terminal {
                paths.push(self.path_string(&path));
                continue;
            }
            for next in self.successors(node) {
                if path.contains(&next) {
                    return Err(LatticeError::Cycle(next));
                }
                let mut extended = path.clone();
                extended.push(next);
                stack.push((next, extended));
            }
        }
        Ok(paths)
    }

    fn path_string(&self, path: &[NodeId]) -> String {
        path.iter()
            .filter_map(|id| self.node(*id))
            .map(|n| n.word.spelling())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Fail on any edge/node reference that does not resolve both ways.
    pub fn check_consistency(&self) -> Result<(), LatticeError> {
        for node in self.nodes.values() {
            for e in &node.entering {
                let edge = self.edges.get(e).ok_or_else(|| {
                    LatticeError::Inconsistent(format!("node {} enters missing edge", node.id))
                })?;
                if edge.to != node.id {
                    return Err(LatticeError::Inconsistent(format!(
                        "edge {} -> {} listed as entering node {}",
                        edge.from, edge.to, node.id
                    )));
                }
            }
            for e in &node.leaving {
                let edge = self.edges.get(e).ok_or_else(|| {
                    LatticeError::Inconsistent(format!("node {} leaves by missing edge", node.id))
                })?;
                if edge.from != node.id {
                    return Err(LatticeError::Inconsistent(format!(
                        "edge {} -> {} listed as leaving node {}",
                        edge.from, edge.to, node.id
                    )));
                }
            }
        }
        for edge in self.edges.values() {
            let from = self.nodes.get(&edge.from).ok_or_else(|| {
                LatticeError::Inconsistent(format!("edge {} starts at missing node", edge.from))
            })?;
            let to = self.nodes.get(&edge.to).ok_or_else(|| {
                LatticeError::Inconsistent(format!("edge {} ends at missing node", edge.to))
            })?;
            if !from.leaving.contains(&edge.id) || !to.entering.contains(&edge.id) {
                return Err(LatticeError::Inconsistent(format!(
                    "edge {} -> {} missing from adjacency lists",
                    edge.from, edge.to
                )));
            }
        }
        for (name, id) in [("initial", self.initial), ("terminal", self.terminal)] {
            if let Some(id) = id {
                if !self.nodes.contains_key(&id) {
                    return Err(LatticeError::Inconsistent(format!("{name} node {id} missing")));
                }
            }
        }
        Ok(())
    }

    /// Structural equality from the initial nodes: equivalent nodes joined
    /// by edges with matching scores, with nothing left over on either side.
    pub fn is_equivalent(&self, other: &Lattice) -> bool {
        let (Some(a), Some(b)) = (self.initial, other.initial) else {
            return self.initial.is_none() && other.initial.is_none();
        };
        let mut verified: HashSet<(NodeId, NodeId)> = HashSet::new();
        let mut stack = vec![(a, b)];
        while let Some((a, b)) = stack.pop() {
            if !verified.insert((a, b)) {
                continue;
            }
            let (Some(na), Some(nb)) = (self.node(a), other.node(b)) else {
                return false;
            };
            if !na.is_equivalent(nb) || na.leaving.len() != nb.leaving.len() {
                return false;
            }
            let mut unmatched: Vec<&Edge> =
                nb.leaving.iter().filter_map(|e| other.edges.get(e)).collect();
            for edge in na.leaving.iter().filter_map(|e| self.edges.get(e)) {
                let Some(to) = self.node(edge.to) else {
                    return false;
                };
                let found = unmatched.iter().position(|candidate| {
                    other.node(candidate.to).is_some_and(|n| n.is_equivalent(to))
                        && (candidate.acoustic_score - edge.acoustic_score).abs() <= SCORE_TOLERANCE
                        && (candidate.lm_score - edge.lm_score).abs() <= SCORE_TOLERANCE
                });
                let Some(i) = found else {
                    return false;
                };
                let matched = unmatched.swap_remove(i);
                stack.push((edge.to, matched.to));
            }
        }
        true
    }
}
