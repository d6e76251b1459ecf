//! Lattice minimization.
//!
//! Two sibling nodes are merged when they are equivalent (same word and
//! time span) and share the same neighbours on the far side: the same
//! predecessors in the forward pass, the same successors in the backward
//! pass. Edge scores combine by maximum. The set of word sequences accepted
//! by the lattice never changes.

use tracing::{debug, debug_span};

use super::{EdgeId, Lattice, LatticeError, NodeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub parallel_edges_merged: usize,
    pub forward_merges: usize,
    pub backward_merges: usize,
    pub hanging_nodes_removed: usize,
}

impl OptimizeStats {
    pub fn changes(&self) -> usize {
        self.parallel_edges_merged
            + self.forward_merges
            + self.backward_merges
            + self.hanging_nodes_removed
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

pub struct LatticeOptimizer<'a> {
    lattice: &'a mut Lattice,
    stats: OptimizeStats,
}

impl<'a> LatticeOptimizer<'a> {
    pub fn new(lattice: &'a mut Lattice) -> Self {
        Self {
            lattice,
            stats: OptimizeStats::default(),
        }
    }

    pub fn stats(&self) -> OptimizeStats {
        self.stats
    }

    /// Run forward merging, backward merging and hanging-node removal until
    /// none of them changes the lattice.
    pub fn optimize(mut self) -> Result<OptimizeStats, LatticeError> {
        let _span = debug_span!("optimize").entered();
        let (nodes, edges) = (self.lattice.num_nodes(), self.lattice.num_edges());
        loop {
            let before = self.stats.changes();
            self.optimize_forward()?;
            self.optimize_backward()?;
            self.remove_hanging_nodes();
            if self.stats.changes() == before {
                break;
            }
        }
        debug!(
            nodes_before = nodes,
            edges_before = edges,
            nodes_after = self.lattice.num_nodes(),
            edges_after = self.lattice.num_edges(),
            forward = self.stats.forward_merges,
            backward = self.stats.backward_merges,
            "lattice optimized"
        );
        Ok(self.stats)
    }

    /// Merge successors of each node until no merge applies.
    pub fn optimize_forward(&mut self) -> Result<(), LatticeError> {
        self.sweep(Direction::Forward)
    }

    /// Merge predecessors of each node until no merge applies.
    pub fn optimize_backward(&mut self) -> Result<(), LatticeError> {
        self.sweep(Direction::Backward)
    }

    fn sweep(&mut self, direction: Direction) -> Result<(), LatticeError> {
        loop {
            let mut changed = false;
            for id in self.lattice.node_ids() {
                if self.lattice.has_node(id) && self.optimize_node(id, direction)? {
                    changed = true;
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn optimize_node(&mut self, id: NodeId, direction: Direction) -> Result<bool, LatticeError> {
        let Some(node) = self.lattice.node(id) else {
            return Ok(false);
        };
        let edges: Vec<EdgeId> = match direction {
            Direction::Forward => node.leaving.clone(),
            Direction::Backward => node.entering.clone(),
        };
        let far_end = |lattice: &Lattice, e: EdgeId| {
            lattice.edge(e).map(|e| match direction {
                Direction::Forward => e.to,
                Direction::Backward => e.from,
            })
        };
        for (j, &e1) in edges.iter().enumerate() {
            for &e2 in &edges[j + 1..] {
                let lattice = &*self.lattice;
                let (Some(n1), Some(n2)) = (far_end(lattice, e1), far_end(lattice, e2)) else {
                    continue;
                };
                if n1 == n2 {
                    self.merge_parallel_edges(e1, e2);
                    return Ok(true);
                }
                if self.mergeable(n1, n2, direction) {
                    let merged = self.merge_nodes(n1, n2)?;
                    if merged {
                        match direction {
                            Direction::Forward => self.stats.forward_merges += 1,
                            Direction::Backward => self.stats.backward_merges += 1,
                        }
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    fn mergeable(&self, n1: NodeId, n2: NodeId, direction: Direction) -> bool {
        let (Some(a), Some(b)) = (self.lattice.node(n1), self.lattice.node(n2)) else {
            return false;
        };
        if !a.is_equivalent(b) {
            return false;
        }
        let neighbours = |id: NodeId| {
            let mut ids = match direction {
                Direction::Forward => self.lattice.predecessors(id),
                Direction::Backward => self.lattice.successors(id),
            };
            ids.sort();
            ids.dedup();
            ids
        };
        neighbours(n1) == neighbours(n2)
    }

    fn merge_parallel_edges(&mut self, keep: EdgeId, drop: EdgeId) {
        let Some((acoustic, lm)) = self
            .lattice
            .edge(drop)
            .map(|e| (e.acoustic_score, e.lm_score))
        else {
            return;
        };
        if let Some(edge) = self.lattice.edge_mut(keep) {
            edge.acoustic_score = edge.acoustic_score.max(acoustic);
            edge.lm_score = edge.lm_score.max(lm);
        }
        self.lattice.remove_edge(drop);
        self.stats.parallel_edges_merged += 1;
    }

    /// Fold one node into the other, moving its edges over. The initial and
    /// terminal nodes always survive.
    fn merge_nodes(&mut self, n1: NodeId, n2: NodeId) -> Result<bool, LatticeError> {
        let protected =
            |n: NodeId| Some(n) == self.lattice.initial || Some(n) == self.lattice.terminal;
        let (keep, drop) = match (protected(n1), protected(n2)) {
            (true, true) => return Ok(false),
            (false, true) => (n2, n1),
            _ => (n1, n2),
        };
        let Some(node) = self.lattice.node(drop) else {
            return Ok(false);
        };
        let moved: Vec<(NodeId, NodeId, f32, f32)> = node
            .entering
            .iter()
            .chain(&node.leaving)
            .filter_map(|e| self.lattice.edge(*e))
            .filter_map(|e| {
                let from = if e.from == drop { keep } else { e.from };
                let to = if e.to == drop { keep } else { e.to };
                (from != to).then_some((from, to, e.acoustic_score, e.lm_score))
            })
            .collect();
        self.lattice.remove_node_and_edges(drop);
        for (from, to, acoustic, lm) in moved {
            self.lattice.add_or_merge_edge(from, to, acoustic, lm)?;
        }
        Ok(true)
    }

    /// Remove nodes other than the initial and terminal ones that have no
    /// entering or no leaving edges, repeatedly.
    pub fn remove_hanging_nodes(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let hanging: Vec<NodeId> = self
                .lattice
                .nodes()
                .filter(|n| {
                    Some(n.id) != self.lattice.initial && Some(n.id) != self.lattice.terminal
                })
                .filter(|n| n.entering.is_empty() || n.leaving.is_empty())
                .map(|n| n.id)
                .collect();
            if hanging.is_empty() {
                break;
            }
            for id in hanging {
                self.lattice.remove_node_and_edges(id);
                removed += 1;
            }
        }
        self.stats.hanging_nodes_removed += removed;
        removed
    }
}

impl Lattice {
    /// Minimize this lattice in place.
    pub fn optimize(&mut self) -> Result<OptimizeStats, LatticeError> {
        LatticeOptimizer::new(self).optimize()
    }
}
