use proptest::prelude::*;

use super::{diamond, sorted_paths};
use crate::lattice::{Lattice, LatticeOptimizer, NodeId};
use crate::logmath::LogMath;
use crate::search::Word;

/// `<s>` with two identical `a` successors that both lead to `</s>`.
fn twin_siblings() -> (Lattice, [NodeId; 4]) {
    let mut lattice = Lattice::new(LogMath::natural());
    let s = lattice.add_node(Word::sentence_start(), 0, 0);
    let a1 = lattice.add_node(Word::from_spelling("a"), 0, 2);
    let a2 = lattice.add_node(Word::from_spelling("a"), 0, 2);
    let e = lattice.add_node(Word::sentence_end(), 2, 3);
    lattice.add_edge(s, a1, -1.0, -2.0).unwrap();
    lattice.add_edge(s, a2, -3.0, -1.0).unwrap();
    lattice.add_edge(a1, e, 0.0, 0.0).unwrap();
    lattice.add_edge(a2, e, -1.0, 0.0).unwrap();
    lattice.set_initial_node(s);
    lattice.set_terminal_node(e);
    (lattice, [s, a1, a2, e])
}

#[test]
fn equivalent_siblings_merge_with_max_scores() {
    let (mut lattice, [s, a1, a2, e]) = twin_siblings();
    let stats = lattice.optimize().unwrap();
    lattice.check_consistency().unwrap();
    assert_eq!(stats.forward_merges, 1);
    assert_eq!(lattice.num_nodes(), 3);
    assert!(lattice.has_node(a1) ^ lattice.has_node(a2));
    let a = if lattice.has_node(a1) { a1 } else { a2 };
    let into = lattice.edge(lattice.edge_between(s, a).unwrap()).unwrap();
    assert_eq!((into.acoustic_score(), into.lm_score()), (-1.0, -1.0));
    let out = lattice.edge(lattice.edge_between(a, e).unwrap()).unwrap();
    assert_eq!(out.acoustic_score(), 0.0);
    assert_eq!(sorted_paths(&lattice), vec!["<s> a </s>"]);
}

#[test]
fn different_words_stay_apart() {
    let (mut lattice, _) = diamond();
    let stats = lattice.optimize().unwrap();
    assert_eq!(stats.changes(), 0);
    assert_eq!(lattice.num_nodes(), 4);
}

#[test]
fn parallel_edges_collapse() {
    let (mut lattice, [s, a, _, _]) = diamond();
    lattice.add_edge(s, a, -0.5, -4.0).unwrap();
    let stats = lattice.optimize().unwrap();
    assert_eq!(stats.parallel_edges_merged, 1);
    assert_eq!(lattice.num_edges(), 4);
    let edge = lattice.edge(lattice.edge_between(s, a).unwrap()).unwrap();
    assert_eq!((edge.acoustic_score(), edge.lm_score()), (-0.5, 0.0));
}

#[test]
fn hanging_nodes_are_removed() {
    let (mut lattice, [_, a, _, _]) = diamond();
    let dead_end = lattice.add_node(Word::from_spelling("c"), 3, 4);
    let orphan = lattice.add_node(Word::from_spelling("d"), 1, 2);
    lattice.add_edge(a, dead_end, 0.0, 0.0).unwrap();
    let mut optimizer = LatticeOptimizer::new(&mut lattice);
    assert_eq!(optimizer.remove_hanging_nodes(), 2);
    assert!(!lattice.has_node(dead_end));
    assert!(!lattice.has_node(orphan));
    assert_eq!(lattice.num_nodes(), 4);
}

#[test]
fn backward_pass_merges_shared_successors() {
    // <s> -> x -> a1 -> </s> and <s> -> y -> a2 -> </s>: nothing to merge.
    // <s> -> a1 -> x, <s> -> a2 -> x: forward merge.
    // a1 <- x, a2 <- y, both -> </s>: backward merge needs equal successors.
    let mut lattice = Lattice::new(LogMath::natural());
    let s = lattice.add_node(Word::sentence_start(), 0, 0);
    let x = lattice.add_node(Word::from_spelling("x"), 0, 1);
    let y = lattice.add_node(Word::from_spelling("y"), 0, 1);
    let a1 = lattice.add_node(Word::from_spelling("a"), 1, 2);
    let a2 = lattice.add_node(Word::from_spelling("a"), 1, 2);
    let e = lattice.add_node(Word::sentence_end(), 2, 3);
    for (from, to) in [(s, x), (s, y), (x, a1), (y, a2), (a1, e), (a2, e)] {
        lattice.add_edge(from, to, -1.0, 0.0).unwrap();
    }
    lattice.set_initial_node(s);
    lattice.set_terminal_node(e);
    let before = sorted_paths(&lattice);

    let stats = lattice.optimize().unwrap();
    assert_eq!(stats.backward_merges, 1);
    assert_eq!(lattice.num_nodes(), 5);
    assert_eq!(sorted_paths(&lattice), before);
}

#[test]
fn terminal_node_survives_merges() {
    let mut lattice = Lattice::new(LogMath::natural());
    let s = lattice.add_node(Word::sentence_start(), 0, 0);
    let e1 = lattice.add_node(Word::sentence_end(), 0, 1);
    let e2 = lattice.add_node(Word::sentence_end(), 0, 1);
    lattice.add_edge(s, e1, -1.0, 0.0).unwrap();
    lattice.add_edge(s, e2, -2.0, 0.0).unwrap();
    lattice.set_initial_node(s);
    lattice.set_terminal_node(e2);
    lattice.optimize().unwrap();
    assert_eq!(lattice.terminal_node(), Some(e2));
    assert!(!lattice.has_node(e1));
    assert_eq!(sorted_paths(&lattice), vec!["<s> </s>"]);
}

/// Layered lattices over a two-word vocabulary. Each node links to the
/// next-layer nodes selected by its mask (at least one).
fn layered(layers: &[Vec<(usize, u8)>]) -> Lattice {
    const WORDS: [&str; 2] = ["a", "b"];
    let mut lattice = Lattice::new(LogMath::natural());
    let s = lattice.add_node(Word::sentence_start(), 0, 0);
    lattice.set_initial_node(s);
    let mut previous: Vec<(NodeId, u8)> = vec![(s, u8::MAX)];
    for (depth, layer) in layers.iter().enumerate() {
        let current: Vec<(NodeId, u8)> = layer
            .iter()
            .map(|&(w, mask)| {
                let word = Word::from_spelling(WORDS[w]);
                (lattice.add_node(word, depth, depth + 1), mask)
            })
            .collect();
        link(&mut lattice, &previous, &current);
        previous = current;
    }
    let e = lattice.add_node(Word::sentence_end(), layers.len(), layers.len() + 1);
    lattice.set_terminal_node(e);
    for &(from, _) in &previous {
        lattice.add_edge(from, e, -1.0, 0.0).unwrap();
    }
    lattice
}

fn link(lattice: &mut Lattice, from: &[(NodeId, u8)], to: &[(NodeId, u8)]) {
    for &(f, mask) in from {
        let mut linked = false;
        for (j, &(t, _)) in to.iter().enumerate() {
            if mask & (1 << j) != 0 {
                lattice.add_edge(f, t, -(j as f32) - 1.0, -0.5).unwrap();
                linked = true;
            }
        }
        if !linked {
            lattice.add_edge(f, to[0].0, -1.0, -0.5).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn optimize_preserves_paths_and_is_idempotent(
        layers in prop::collection::vec(
            prop::collection::vec((0usize..2, any::<u8>()), 1..4),
            1..5,
        )
    ) {
        let mut lattice = layered(&layers);
        let before = sorted_paths(&lattice);
        lattice.optimize().unwrap();
        lattice.check_consistency().unwrap();
        prop_assert_eq!(sorted_paths(&lattice), before);
        let again = lattice.optimize().unwrap();
        prop_assert_eq!(again.changes(), 0);
    }
}
