use std::collections::HashMap;

use super::{GraphBuilder, GraphError, StaticGraph};
use crate::search::{UnitId, Word};

const WORD_END_ORDER: usize = 0;
const BRANCH_ORDER: usize = 1;
const SENTENCE_END_ORDER: usize = 2;
const UNIT_ORDER: usize = 3;

/// A loop over words: `<s>`, then any sequence of words, then `</s>`.
///
/// Each pronunciation is a left-to-right chain of emitting unit states with
/// self-loops. Pronunciations of the same spelling share one word-end state.
///
/// State orders: 0 word ends and `<s>`, 1 the branch, 2 `</s>`, 3 units.
#[derive(Debug, Clone, Default)]
pub struct WordLoop {
    words: Vec<(String, Vec<UnitId>)>,
    language_score: f32,
    self_loop: f32,
    advance: f32,
    word_insertion: f32,
}

impl WordLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pronunciation of `spelling`.
    pub fn word(mut self, spelling: &str, units: &[UnitId]) -> Self {
        self.words.push((spelling.to_string(), units.to_vec()));
        self
    }

    /// Log probability of entering a word or `</s>` from the branch.
    pub fn language_score(mut self, score: f32) -> Self {
        self.language_score = score;
        self
    }

    pub fn self_loop(mut self, score: f32) -> Self {
        self.self_loop = score;
        self
    }

    pub fn advance(mut self, score: f32) -> Self {
        self.advance = score;
        self
    }

    pub fn word_insertion(mut self, score: f32) -> Self {
        self.word_insertion = score;
        self
    }

    pub fn build(self) -> Result<StaticGraph, GraphError> {
        if self.words.is_empty() {
            return Err(GraphError::Empty("word loop has no words"));
        }
        let mut b = GraphBuilder::new();
        let start = b.word(Word::SENTENCE_START, Word::sentence_start(), WORD_END_ORDER);
        let branch = b.non_emitting("branch", BRANCH_ORDER);
        let end = b.final_word(Word::SENTENCE_END, Word::sentence_end(), SENTENCE_END_ORDER);
        b.initial(start)
            .num_state_order(UNIT_ORDER + 1)
            .arc(start, branch, 0.0, 0.0)
            .arc(branch, end, self.language_score, 0.0);

        let mut word_ends: HashMap<&str, usize> = HashMap::new();
        for (variant, (spelling, units)) in self.words.iter().enumerate() {
            if units.is_empty() {
                return Err(GraphError::Empty("word without units"));
            }
            let word_end = *word_ends.entry(spelling.as_str()).or_insert_with(|| {
                let id = b.word(spelling, Word::from_spelling(spelling), WORD_END_ORDER);
                b.arc(id, branch, 0.0, 0.0);
                id
            });
            let mut previous = None;
            for (i, &unit) in units.iter().enumerate() {
                let id = b.emitting(&format!("{spelling}.{variant}.{i}"), unit, UNIT_ORDER);
                b.arc(id, id, self.self_loop, 0.0);
                match previous {
                    None => b.arc(branch, id, self.language_score, 0.0),
                    Some(prev) => b.arc(prev, id, self.advance, 0.0),
                };
                previous = Some(id);
            }
            if let Some(last) = previous {
                b.arc(last, word_end, self.advance, self.word_insertion);
            }
        }
        b.build()
    }
}

/// A context-independent loop over acoustic units, for fast match.
///
/// State orders: 0 the branch, 1 units.
#[derive(Debug, Clone)]
pub struct PhoneLoop {
    units: Vec<UnitId>,
    phone_insertion: f32,
    self_loop: f32,
}

impl PhoneLoop {
    pub fn new(units: &[UnitId]) -> Self {
        Self {
            units: units.to_vec(),
            phone_insertion: 0.0,
            self_loop: 0.0,
        }
    }

    pub fn phone_insertion(mut self, score: f32) -> Self {
        self.phone_insertion = score;
        self
    }

    pub fn self_loop(mut self, score: f32) -> Self {
        self.self_loop = score;
        self
    }

    pub fn build(self) -> Result<StaticGraph, GraphError> {
        if self.units.is_empty() {
            return Err(GraphError::Empty("phone loop has no units"));
        }
        let mut b = GraphBuilder::new();
        let branch = b.non_emitting("branch", 0);
        b.initial(branch).num_state_order(2);
        for &unit in &self.units {
            let id = b.emitting(&format!("unit{unit}"), unit, 1);
            b.arc(branch, id, 0.0, self.phone_insertion)
                .arc(id, id, self.self_loop, 0.0)
                .arc(id, branch, 0.0, 0.0);
        }
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Linguist, SearchState};

    #[test]
    fn word_loop_shares_word_ends() {
        let graph = WordLoop::new()
            .word("cat", &[1, 2])
            .word("cat", &[5, 2])
            .word("dog", &[3])
            .build()
            .unwrap();
        // <s>, branch, </s>, cat end, 2 cat units, 2 cat units, dog end, dog unit
        assert_eq!(graph.len(), 10);
        assert_eq!(graph.num_state_order(), 4);
        let cat_ends = (0..graph.len())
            .filter_map(|i| graph.state(i))
            .filter(|s| s.word().is_some_and(|w| w.spelling() == "cat"))
            .count();
        assert_eq!(cat_ends, 1);
    }

    #[test]
    fn word_loop_orders() {
        let graph = WordLoop::new().word("a", &[1]).build().unwrap();
        let start = graph.initial_state();
        assert_eq!(start.order(), 0);
        let branch = &start.successors()[0].state;
        assert_eq!(branch.order(), 1);
        let orders: Vec<usize> = branch.successors().iter().map(|a| a.state.order()).collect();
        assert_eq!(orders, vec![2, 3]);
        assert!(branch.successors()[0].state.is_final());
    }

    #[test]
    fn empty_loops_are_errors() {
        assert!(WordLoop::new().build().is_err());
        assert!(WordLoop::new().word("x", &[]).build().is_err());
        assert!(PhoneLoop::new(&[]).build().is_err());
    }

    #[test]
    fn phone_loop_structure() {
        let graph = PhoneLoop::new(&[1, 2, 3]).build().unwrap();
        assert_eq!(graph.num_state_order(), 2);
        assert_eq!(graph.initial_state().successors().len(), 3);
        assert_eq!(graph.num_arcs(), 9);
    }
}
