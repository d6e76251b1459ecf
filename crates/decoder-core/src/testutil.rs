//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::{GraphBuilder, StaticGraph};
use crate::search::{
    SearchState, SearchStateArc, StateKey, StateRef, Token, TokenArena, TokenId, UnitId, Word,
};

/// A detached state with no successors.
#[derive(Debug)]
pub struct TestState {
    pub key: u64,
    pub order: usize,
    pub emitting: bool,
    pub is_final: bool,
    pub word: Option<Word>,
    pub unit: Option<UnitId>,
}

impl SearchState for TestState {
    fn key(&self) -> StateKey {
        StateKey(self.key)
    }

    fn order(&self) -> usize {
        self.order
    }

    fn is_emitting(&self) -> bool {
        self.emitting
    }

    fn is_final(&self) -> bool {
        self.is_final
    }

    fn word(&self) -> Option<&Word> {
        self.word.as_ref()
    }

    fn unit(&self) -> Option<UnitId> {
        self.unit
    }

    fn successors(&self) -> Vec<SearchStateArc> {
        Vec::new()
    }
}

pub fn emitting_state(key: u64, unit: UnitId) -> StateRef {
    Arc::new(TestState {
        key,
        order: 1,
        emitting: true,
        is_final: false,
        word: None,
        unit: Some(unit),
    })
}

pub fn non_emitting_state(key: u64, order: usize) -> StateRef {
    Arc::new(TestState {
        key,
        order,
        emitting: false,
        is_final: false,
        word: None,
        unit: None,
    })
}

pub fn word_state(key: u64, spelling: &str) -> StateRef {
    Arc::new(TestState {
        key,
        order: 0,
        emitting: false,
        is_final: spelling == Word::SENTENCE_END,
        word: Some(Word::from_spelling(spelling)),
        unit: None,
    })
}

/// One emitting token per score, each in its own state.
pub fn arena_with_scores(scores: &[f32]) -> (TokenArena, Vec<TokenId>) {
    let mut arena = TokenArena::new();
    let ids = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| {
            arena.alloc(Token::new(
                None,
                emitting_state(i as u64, 1),
                score,
                0.0,
                0.0,
                0,
            ))
        })
        .collect();
    (arena, ids)
}

/// Word loop over "cat" (units 1, 2) and "dog" (units 3, 4).
pub fn cat_dog_graph() -> StaticGraph {
    crate::graph::WordLoop::new()
        .word("cat", &[1, 2])
        .word("dog", &[3, 4])
        .language_score(-1.0)
        .build()
        .expect("word loop graph")
}

/// Score table favouring `units[i]` at frame `i`; everything else scores `floor`.
pub fn frames_favouring(units: &[UnitId], floor: f32) -> Vec<HashMap<UnitId, f32>> {
    units
        .iter()
        .map(|&u| {
            let mut frame = HashMap::new();
            frame.insert(u, -1.0);
            for other in 1..=8 {
                frame.entry(other).or_insert(floor);
            }
            frame
        })
        .collect()
}

/// A builder preloaded with `<s>` as the initial word state.
pub fn builder_with_start() -> (GraphBuilder, usize) {
    let mut b = GraphBuilder::new();
    let start = b.word("start", Word::sentence_start(), 0);
    b.initial(start);
    (b, start)
}
