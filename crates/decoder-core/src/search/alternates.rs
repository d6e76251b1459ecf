//! Predecessors displaced by recombination, kept for lattice building.

use std::collections::HashMap;

use super::token::{TokenArena, TokenId};

#[derive(Debug, Default)]
pub struct AlternateHypothesisManager {
    max_edges: usize,
    alternates: HashMap<TokenId, Vec<TokenId>>,
}

impl AlternateHypothesisManager {
    pub fn new(max_edges: usize) -> Self {
        Self {
            max_edges,
            alternates: HashMap::new(),
        }
    }

    pub fn max_edges(&self) -> usize {
        self.max_edges
    }

    /// Record `predecessor` as an alternate history of `token`. Recording a
    /// token's current predecessor is a no-op.
    pub fn add_alternate_predecessor(
        &mut self,
        arena: &TokenArena,
        token: TokenId,
        predecessor: TokenId,
    ) {
        if arena[token].predecessor() == Some(predecessor) {
            return;
        }
        let list = self.alternates.entry(token).or_default();
        if !list.contains(&predecessor) {
            list.push(predecessor);
        }
    }

    pub fn alternate_predecessors(&self, token: TokenId) -> &[TokenId] {
        self.alternates.get(&token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_alternate_predecessors(&self, token: TokenId) -> bool {
        self.alternates.get(&token).is_some_and(|l| !l.is_empty())
    }

    /// Keep at most `max_edges - 1` alternates per token, best first.
    pub fn purge(&mut self, arena: &TokenArena) {
        let keep = self.max_edges.saturating_sub(1);
        for list in self.alternates.values_mut() {
            list.sort_by(|&a, &b| arena.score(b).total_cmp(&arena.score(a)));
            list.truncate(keep);
        }
        self.alternates.retain(|_, l| !l.is_empty());
    }

    /// Tokens that have at least one alternate.
    pub fn len(&self) -> usize {
        self.alternates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternates.is_empty()
    }

    pub fn clear(&mut self) {
        self.alternates.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Token;
    use crate::testutil::{arena_with_scores, emitting_state};
    use proptest::prelude::*;

    #[test]
    fn current_predecessor_is_not_an_alternate() {
        let (mut arena, ids) = arena_with_scores(&[-1.0, -2.0]);
        let child = arena.alloc(Token::new(Some(ids[0]), emitting_state(9, 1), -3.0, 0.0, 0.0, 1));
        let mut alternates = AlternateHypothesisManager::new(3);
        alternates.add_alternate_predecessor(&arena, child, ids[0]);
        alternates.add_alternate_predecessor(&arena, child, ids[1]);
        alternates.add_alternate_predecessor(&arena, child, ids[1]);
        assert_eq!(alternates.alternate_predecessors(child), &[ids[1]]);
        assert!(!alternates.has_alternate_predecessors(ids[0]));
    }

    #[test]
    fn purge_sorts_and_truncates() {
        let (mut arena, ids) = arena_with_scores(&[-4.0, -1.0, -3.0, -2.0]);
        let child = arena.alloc(Token::new(None, emitting_state(9, 1), 0.0, 0.0, 0.0, 1));
        let mut alternates = AlternateHypothesisManager::new(3);
        for &id in &ids {
            alternates.add_alternate_predecessor(&arena, child, id);
        }
        alternates.purge(&arena);
        assert_eq!(alternates.alternate_predecessors(child), &[ids[1], ids[3]]);
    }

    #[test]
    fn single_edge_keeps_no_alternates() {
        let (mut arena, ids) = arena_with_scores(&[-1.0]);
        let child = arena.alloc(Token::new(None, emitting_state(9, 1), 0.0, 0.0, 0.0, 1));
        let mut alternates = AlternateHypothesisManager::new(1);
        alternates.add_alternate_predecessor(&arena, child, ids[0]);
        alternates.purge(&arena);
        assert!(alternates.is_empty());
    }

    proptest! {
        #[test]
        fn purge_bounds_and_orders(
            scores in prop::collection::vec(-100i32..0, 1..40),
            max_edges in 1usize..10,
        ) {
            let scores: Vec<f32> = scores.into_iter().map(|s| s as f32).collect();
            let (mut arena, ids) = arena_with_scores(&scores);
            let child = arena.alloc(Token::new(None, emitting_state(999, 1), 0.0, 0.0, 0.0, 1));
            let mut alternates = AlternateHypothesisManager::new(max_edges);
            for &id in &ids {
                alternates.add_alternate_predecessor(&arena, child, id);
            }
            alternates.purge(&arena);
            let kept = alternates.alternate_predecessors(child);
            prop_assert!(kept.len() <= max_edges - 1);
            prop_assert!(kept.windows(2).all(|w| arena.score(w[0]) >= arena.score(w[1])));
        }
    }
}
