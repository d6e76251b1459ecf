//! Forward-backward scoring over the lattice.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, debug_span};

use super::{Lattice, LatticeError, NodeId};
use crate::logmath::{log_mul, LOG_ONE, LOG_ZERO};

/// A word on the best lattice path with its confidence.
#[derive(Debug, Clone, Serialize)]
pub struct WordResult {
    pub word: String,
    pub begin_time: usize,
    pub end_time: usize,
    /// Log posterior in the lattice's base.
    pub posterior: f32,
    /// Linear posterior in `[0, 1]`.
    pub confidence: f64,
}

impl Lattice {
    /// Nodes reachable from the initial node, each after all of its
    /// predecessors on those paths.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, LatticeError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Open,
            Done,
        }

        let initial = self.require_initial()?;
        let mut marks: HashMap<NodeId, Mark> = HashMap::new();
        let mut post_order = Vec::with_capacity(self.num_nodes());
        let mut stack: Vec<(NodeId, usize)> = vec![(initial, 0)];
        marks.insert(initial, Mark::Open);

        while let Some((id, next)) = stack.pop() {
            let successors = self.successors(id);
            if let Some(&child) = successors.get(next) {
                stack.push((id, next + 1));
                match marks.get(&child) {
                    Some(Mark::Open) => return Err(LatticeError::Cycle(child)),
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child, Mark::Open);
                        stack.push((child, 0));
                    }
                }
            } else {
                marks.insert(id, Mark::Done);
                post_order.push(id);
            }
        }
        post_order.reverse();
        Ok(post_order)
    }

    pub fn compute_node_posteriors(&mut self, language_weight: f32) -> Result<(), LatticeError> {
        self.compute_node_posteriors_with(language_weight, false)
    }

    /// Fill in forward, backward, Viterbi and posterior scores of every
    /// node. Edges score `acoustic + lm * language_weight`, or the acoustic
    /// score alone when `acoustic_only` is set. Posteriors are normalized by
    /// the forward score of the terminal node.
    pub fn compute_node_posteriors_with(
        &mut self,
        language_weight: f32,
        acoustic_only: bool,
    ) -> Result<(), LatticeError> {
        let _span = debug_span!("compute_node_posteriors", language_weight).entered();
        let initial = self.require_initial()?;
        let terminal = self.require_terminal()?;
        let order = self.topological_order()?;
        let log_math = self.log_math;

        for node in self.nodes.values_mut() {
            node.forward_score = LOG_ZERO;
            node.backward_score = LOG_ZERO;
            node.viterbi_score = LOG_ZERO;
            node.posterior = LOG_ZERO;
            node.best_predecessor = None;
        }
        let weight = if acoustic_only { 0.0 } else { language_weight };
        if let Some(node) = self.nodes.get_mut(&initial) {
            node.forward_score = LOG_ONE;
            node.viterbi_score = LOG_ONE;
        }

        for &id in &order {
            let (forward, viterbi, leaving) = match self.nodes.get(&id) {
                Some(n) => (n.forward_score, n.viterbi_score, n.leaving.clone()),
                None => continue,
            };
            for e in leaving {
                let Some(edge) = self.edges.get(&e) else {
                    continue;
                };
                let score = edge.score(weight);
                let Some(next) = self.nodes.get_mut(&edge.to) else {
                    continue;
                };
                next.forward_score =
                    log_math.add_as_linear(next.forward_score, log_mul(forward, score));
                let through = log_mul(viterbi, score);
                if next.best_predecessor.is_none() || through > next.viterbi_score {
                    next.best_predecessor = Some(id);
                    next.viterbi_score = through;
                }
            }
        }

        if let Some(node) = self.nodes.get_mut(&terminal) {
            node.backward_score = LOG_ONE;
        }
        for &id in order.iter().rev() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let mut backward = node.backward_score;
            for e in &node.leaving {
                let Some(edge) = self.edges.get(e) else {
                    continue;
                };
                let Some(next) = self.nodes.get(&edge.to) else {
                    continue;
                };
                let through = log_mul(next.backward_score, edge.score(weight));
                backward = log_math.add_as_linear(backward, through);
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                node.backward_score = backward;
            }
        }

        let normalizer = self.nodes.get(&terminal).map_or(LOG_ZERO, |n| n.forward_score);
        for node in self.nodes.values_mut() {
            let joint = log_mul(node.forward_score, node.backward_score);
            node.posterior = if joint <= LOG_ZERO || normalizer <= LOG_ZERO {
                LOG_ZERO
            } else {
                joint - normalizer
            };
        }
        debug!(normalizer, nodes = order.len(), "posteriors computed");
        Ok(())
    }

    /// The best path found by the last posterior computation, initial node
    /// first. Empty when the terminal node was never reached.
    pub fn viterbi_path(&self) -> Vec<NodeId> {
        let Some(terminal) = self.terminal else {
            return Vec::new();
        };
        if self.node(terminal).map_or(true, |n| n.viterbi_score <= LOG_ZERO) {
            return Vec::new();
        }
        let mut path = vec![terminal];
        let mut current = terminal;
        while let Some(prev) = self.node(current).and_then(|n| n.best_predecessor) {
            if path.contains(&prev) {
                break;
            }
            path.push(prev);
            current = prev;
        }
        path.reverse();
        path
    }

    /// Non-filler words on the Viterbi path with their confidences.
    pub fn word_results(&self) -> Vec<WordResult> {
        self.viterbi_path()
            .into_iter()
            .filter_map(|id| self.node(id))
            .filter(|n| !n.word.is_filler())
            .map(|n| WordResult {
                word: n.word.spelling().to_string(),
                begin_time: n.begin_time,
                end_time: n.end_time,
                posterior: n.posterior,
                confidence: self.log_math.log_to_linear(n.posterior).min(1.0),
            })
            .collect()
    }
}
