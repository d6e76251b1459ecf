//! A* N-best extraction.
//!
//! Partial paths are expanded best first, ranked by their forward score plus
//! the backward score of the node they end in. The frontier is a bounded
//! queue, so on very large lattices some paths are dropped and fewer than
//! `n` distinct sentences may come back.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, debug_span};

use super::{Lattice, LatticeError, NodeId};

/// A priority queue holding at most `capacity` items. Pushing past capacity
/// evicts the lowest-scored item.
#[derive(Debug, Clone)]
pub struct BoundedPriorityQueue<T> {
    items: VecDeque<(f32, T)>,
    capacity: usize,
}

impl<T> BoundedPriorityQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, score: f32, item: T) {
        if self.items.len() == self.capacity {
            match self.items.front() {
                Some((lowest, _)) if *lowest >= score => return,
                _ => {}
            }
        }
        let at = self.items.partition_point(|(s, _)| *s <= score);
        self.items.insert(at, (score, item));
        if self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Remove the best item.
    pub fn pop(&mut self) -> Option<(f32, T)> {
        self.items.pop_back()
    }

    pub fn peek(&self) -> Option<(f32, &T)> {
        self.items.back().map(|(s, t)| (*s, t))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NbestPath {
    /// Words of the path without fillers, framed by `<s>` and `</s>`.
    pub sentence: String,
    pub nodes: Vec<NodeId>,
    /// Total path score under the posterior language weight.
    pub score: f32,
}

#[derive(Debug, Clone)]
struct Partial {
    sentence: String,
    nodes: Vec<NodeId>,
    forward: f32,
}

pub struct Nbest<'a> {
    lattice: &'a mut Lattice,
    language_weight: f32,
    max_frontier: usize,
}

impl<'a> Nbest<'a> {
    pub fn new(lattice: &'a mut Lattice) -> Self {
        Self {
            lattice,
            language_weight: 1.0,
            max_frontier: 10_000,
        }
    }

    pub fn language_weight(mut self, weight: f32) -> Self {
        self.language_weight = weight;
        self
    }

    pub fn max_frontier(mut self, max: usize) -> Self {
        self.max_frontier = max;
        self
    }

    /// Up to `n` distinct sentences, best first.
    pub fn get_nbest(&mut self, n: usize) -> Result<Vec<NbestPath>, LatticeError> {
        let _span = debug_span!("nbest", n).entered();
        if n == 0 {
            return Ok(Vec::new());
        }
        self.lattice.compute_node_posteriors(self.language_weight)?;
        let lattice = &*self.lattice;
        let initial = lattice.require_initial()?;
        let terminal = lattice.require_terminal()?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut paths = Vec::new();
        let mut queue = BoundedPriorityQueue::new(n.max(self.max_frontier));
        let start_word = lattice
            .node(initial)
            .map(|node| node.word.spelling().to_string())
            .unwrap_or_default();
        queue.push(
            0.0,
            Partial {
                sentence: start_word,
                nodes: vec![initial],
                forward: 0.0,
            },
        );

        while paths.len() < n {
            let Some((score, partial)) = queue.pop() else {
                break;
            };
            let Some(&last) = partial.nodes.last() else {
                continue;
            };
            if last == terminal {
                if seen.insert(partial.sentence.clone()) {
                    paths.push(NbestPath {
                        sentence: partial.sentence,
                        nodes: partial.nodes,
                        score,
                    });
                }
                continue;
            }
            let Some(node) = lattice.node(last) else {
                continue;
            };
            for e in &node.leaving {
                let Some(edge) = lattice.edge(*e) else {
                    continue;
                };
                let Some(next) = lattice.node(edge.to) else {
                    continue;
                };
                let forward = partial.forward + edge.score(self.language_weight);
                let mut sentence = partial.sentence.clone();
                if next.word.is_sentence_end() || !next.word.is_filler() {
                    sentence.push(' ');
                    sentence.push_str(next.word.spelling());
                }
                let mut nodes = partial.nodes.clone();
                nodes.push(edge.to);
                queue.push(
                    forward + next.backward_score,
                    Partial {
                        sentence,
                        nodes,
                        forward,
                    },
                );
            }
        }
        debug!(found = paths.len(), frontier = queue.len(), "n-best search done");
        Ok(paths)
    }
}
