use super::{chain, diamond};
use crate::logmath::LOG_ZERO;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn single_path_has_certain_posteriors() {
    let (mut lattice, ids) = chain(&[("cat", -1.0, -2.0), ("</s>", -1.0, -1.0)]);
    lattice.compute_node_posteriors(1.0).unwrap();
    let end = lattice.node(ids[2]).unwrap();
    assert!(close(end.forward_score(), -5.0));
    assert!(close(lattice.node(ids[0]).unwrap().backward_score(), -5.0));
    for id in ids {
        assert!(close(lattice.node(id).unwrap().posterior(), 0.0));
    }
}

#[test]
fn language_weight_scales_lm_scores() {
    let (mut lattice, ids) = chain(&[("cat", -1.0, -2.0), ("</s>", -1.0, -1.0)]);
    lattice.compute_node_posteriors(2.0).unwrap();
    assert!(close(lattice.node(ids[2]).unwrap().forward_score(), -8.0));

    lattice.compute_node_posteriors_with(2.0, true).unwrap();
    assert!(close(lattice.node(ids[2]).unwrap().forward_score(), -2.0));
}

#[test]
fn competing_paths_share_probability() {
    let (mut lattice, [s, a, b, e]) = diamond();
    lattice.compute_node_posteriors(1.0).unwrap();
    let total = (-1.0f64).exp() + (-2.0f64).exp();
    let log_math = *lattice.log_math();
    let pa = log_math.log_to_linear(lattice.node(a).unwrap().posterior());
    let pb = log_math.log_to_linear(lattice.node(b).unwrap().posterior());
    assert!((pa - (-1.0f64).exp() / total).abs() < 1e-4);
    assert!((pa + pb - 1.0).abs() < 1e-4);
    assert!(close(lattice.node(s).unwrap().posterior(), 0.0));
    assert!(close(lattice.node(e).unwrap().posterior(), 0.0));
    assert!(close(lattice.node(e).unwrap().forward_score(), total.ln() as f32));
}

#[test]
fn viterbi_path_follows_best_predecessors() {
    let (mut lattice, [s, a, _, e]) = diamond();
    lattice.compute_node_posteriors(1.0).unwrap();
    assert_eq!(lattice.viterbi_path(), vec![s, a, e]);
    assert!(close(lattice.node(e).unwrap().viterbi_score(), -1.0));
    assert_eq!(lattice.node(a).unwrap().best_predecessor(), Some(s));

    let words = lattice.word_results();
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].word, "a");
    assert!(words[0].confidence > 0.5 && words[0].confidence <= 1.0);
}

#[test]
fn unreachable_nodes_get_zero_posterior() {
    let (mut lattice, _) = diamond();
    let stray = lattice.add_node(crate::search::Word::from_spelling("x"), 5, 6);
    lattice.compute_node_posteriors(1.0).unwrap();
    assert_eq!(lattice.node(stray).unwrap().posterior(), LOG_ZERO);
}

#[test]
fn viterbi_path_is_empty_before_scoring() {
    let (lattice, _) = diamond();
    assert!(lattice.viterbi_path().is_empty());
    assert!(lattice.word_results().is_empty());
}
