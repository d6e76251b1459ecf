mod optimizer;
mod posterior;
mod structure;

use super::{Lattice, NodeId};
use crate::logmath::LogMath;
use crate::search::Word;

/// `<s>` at frame 0, one node per word, then `</s>`; each edge carries the
/// scores given for the node it enters.
pub(super) fn chain(words: &[(&str, f32, f32)]) -> (Lattice, Vec<NodeId>) {
    let mut lattice = Lattice::new(LogMath::natural());
    let start = lattice.add_node(Word::sentence_start(), 0, 0);
    lattice.set_initial_node(start);
    let mut ids = vec![start];
    for (i, &(spelling, acoustic, lm)) in words.iter().enumerate() {
        let word = Word::from_spelling(spelling);
        let id = lattice.add_node(word, i, i + 1);
        lattice.add_edge(ids[ids.len() - 1], id, acoustic, lm).unwrap();
        ids.push(id);
    }
    if let Some(&last) = ids.last() {
        if lattice.node(last).is_some_and(|n| n.word().is_sentence_end()) {
            lattice.set_terminal_node(last);
        }
    }
    (lattice, ids)
}

/// `<s>` then either `a` (scores -1, 0) or `b` (-2, 0), then `</s>`.
pub(super) fn diamond() -> (Lattice, [NodeId; 4]) {
    let mut lattice = Lattice::new(LogMath::natural());
    let s = lattice.add_node(Word::sentence_start(), 0, 0);
    let a = lattice.add_node(Word::from_spelling("a"), 0, 3);
    let b = lattice.add_node(Word::from_spelling("b"), 0, 3);
    let e = lattice.add_node(Word::sentence_end(), 3, 4);
    lattice.add_edge(s, a, -1.0, 0.0).unwrap();
    lattice.add_edge(s, b, -2.0, 0.0).unwrap();
    lattice.add_edge(a, e, 0.0, 0.0).unwrap();
    lattice.add_edge(b, e, 0.0, 0.0).unwrap();
    lattice.set_initial_node(s);
    lattice.set_terminal_node(e);
    (lattice, [s, a, b, e])
}

pub(super) fn sorted_paths(lattice: &Lattice) -> Vec<String> {
    let mut paths = lattice.all_paths().unwrap();
    paths.sort();
    paths.dedup();
    paths
}
