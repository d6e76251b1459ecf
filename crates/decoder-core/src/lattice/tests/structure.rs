use super::{chain, diamond, sorted_paths};
use crate::lattice::{EdgeId, LatticeError};

#[test]
fn edges_are_listed_on_both_ends() {
    let (lattice, [s, a, _, e]) = diamond();
    lattice.check_consistency().unwrap();
    assert_eq!(lattice.num_nodes(), 4);
    assert_eq!(lattice.num_edges(), 4);
    assert_eq!(lattice.successors(s).len(), 2);
    assert_eq!(lattice.predecessors(e).len(), 2);
    assert!(lattice.has_edge(s, a));
    assert!(!lattice.has_edge(a, s));
}

#[test]
fn edge_to_unknown_node_fails() {
    let (mut lattice, [s, ..]) = diamond();
    lattice.remove_node_and_edges(s);
    let (_, [_, a, ..]) = diamond();
    assert!(matches!(
        lattice.add_edge(s, a, 0.0, 0.0),
        Err(LatticeError::UnknownNode(_))
    ));
}

#[test]
fn removing_a_node_removes_its_edges() {
    let (mut lattice, [s, a, b, e]) = diamond();
    lattice.remove_node_and_edges(a);
    lattice.check_consistency().unwrap();
    assert_eq!(lattice.num_edges(), 2);
    assert_eq!(lattice.successors(s), vec![b]);
    assert_eq!(lattice.predecessors(e), vec![b]);
    assert_eq!(sorted_paths(&lattice), vec!["<s> b </s>"]);
}

#[test]
fn removing_the_initial_node_clears_it() {
    let (mut lattice, [s, ..]) = diamond();
    lattice.remove_node_and_edges(s);
    assert_eq!(lattice.initial_node(), None);
    assert!(matches!(lattice.all_paths(), Err(LatticeError::MissingInitialNode)));
}

#[test]
fn fillers_are_bypassed() {
    let (mut lattice, ids) = chain(&[
        ("<sil>", -1.0, -0.5),
        ("cat", -2.0, -1.0),
        ("</s>", 0.0, 0.0),
    ]);
    assert_eq!(lattice.remove_fillers().unwrap(), 1);
    lattice.check_consistency().unwrap();
    assert!(!lattice.has_node(ids[1]));
    let edge = lattice.edge_between(ids[0], ids[2]).unwrap();
    let edge = lattice.edge(edge).unwrap();
    assert_eq!(edge.acoustic_score(), -3.0);
    assert_eq!(edge.lm_score(), -1.5);
    assert_eq!(sorted_paths(&lattice), vec!["<s> cat </s>"]);
}

#[test]
fn cross_connect_keeps_better_existing_edge() {
    let (mut lattice, [s, a, _, e]) = diamond();
    lattice.add_edge(s, e, -10.0, -10.0).unwrap();
    lattice.remove_node_and_cross_connect_edges(a).unwrap();
    let edge = lattice.edge(lattice.edge_between(s, e).unwrap()).unwrap();
    assert_eq!(edge.acoustic_score(), -1.0);
    assert_eq!(edge.lm_score(), 0.0);
}

#[test]
fn all_paths_enumerates_every_route() {
    let (lattice, _) = diamond();
    assert_eq!(sorted_paths(&lattice), vec!["<s> a </s>", "<s> b </s>"]);
}

#[test]
fn cycles_are_reported() {
    let (mut lattice, [s, a, ..]) = diamond();
    lattice.add_edge(a, s, 0.0, 0.0).unwrap();
    assert!(matches!(lattice.all_paths(), Err(LatticeError::Cycle(_))));
    assert!(matches!(lattice.topological_order(), Err(LatticeError::Cycle(_))));
}

#[test]
fn dangling_edge_reference_is_inconsistent() {
    let (mut lattice, [_, a, ..]) = diamond();
    lattice.node_mut(a).unwrap().entering.push(EdgeId(999));
    assert!(matches!(
        lattice.check_consistency(),
        Err(LatticeError::Inconsistent(_))
    ));
}

#[test]
fn misfiled_edge_is_inconsistent() {
    let (mut lattice, [s, a, b, _]) = diamond();
    let edge = lattice.edge_between(s, a).unwrap();
    lattice.node_mut(b).unwrap().entering.push(edge);
    assert!(lattice.check_consistency().is_err());
}

#[test]
fn equivalence_is_structural() {
    let (lattice, _) = diamond();
    let copy = lattice.clone();
    assert!(lattice.is_equivalent(&copy));

    let (mut rescored, [s, a, ..]) = diamond();
    let edge = rescored.edge_between(s, a).unwrap();
    rescored.edge_mut(edge).unwrap().acoustic_score = -5.0;
    assert!(!lattice.is_equivalent(&rescored));

    let (mut pruned, [_, _, b, _]) = diamond();
    pruned.remove_node_and_edges(b);
    assert!(!lattice.is_equivalent(&pruned));
}
