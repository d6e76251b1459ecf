//! Trellis tokens and the per-utterance arena that owns them.
//!
//! A token is one hypothesis ending in a state at a frame. Tokens refer to
//! their predecessor by `TokenId`, so any number of descendants can share a
//! predecessor chain. Recombination rewrites a resident token in place
//! (`Token::update`) and every descendant that points at it observes the new
//! predecessor and scores. The arena is cleared as a whole at utterance start.

use std::ops::Index;

use super::state::{StateRef, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u32);

impl TokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    predecessor: Option<TokenId>,
    state: StateRef,
    score: f32,
    acoustic_score: f32,
    language_score: f32,
    insertion_score: f32,
    frame: usize,
    /// Index of the feature frame this token was last scored against.
    last_feature: Option<usize>,
}

impl Token {
    pub fn new(
        predecessor: Option<TokenId>,
        state: StateRef,
        score: f32,
        insertion_score: f32,
        language_score: f32,
        frame: usize,
    ) -> Self {
        Self {
            predecessor,
            state,
            score,
            acoustic_score: 0.0,
            language_score,
            insertion_score,
            frame,
            last_feature: None,
        }
    }

    /// The token that seeds an utterance.
    pub fn initial(state: StateRef) -> Self {
        Self::new(None, state, 0.0, 0.0, 0.0, 0)
    }

    pub fn predecessor(&self) -> Option<TokenId> {
        self.predecessor
    }

    pub fn state(&self) -> &StateRef {
        &self.state
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn acoustic_score(&self) -> f32 {
        self.acoustic_score
    }

    pub fn language_score(&self) -> f32 {
        self.language_score
    }

    pub fn insertion_score(&self) -> f32 {
        self.insertion_score
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn last_feature(&self) -> Option<usize> {
        self.last_feature
    }

    pub fn word(&self) -> Option<&Word> {
        self.state.word()
    }

    pub fn is_word(&self) -> bool {
        self.state.word().is_some()
    }

    pub fn is_emitting(&self) -> bool {
        self.state.is_emitting()
    }

    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }

    /// Add the acoustic score of `feature` to this token.
    pub fn apply_acoustic_score(&mut self, acoustic_score: f32, feature: usize) {
        self.acoustic_score = acoustic_score;
        self.score += acoustic_score;
        self.last_feature = Some(feature);
    }

    /// Replace this token's history with `other`'s (recombination).
    pub(crate) fn update(&mut self, other: Token) {
        self.predecessor = other.predecessor;
        self.state = other.state;
        self.score = other.score;
        self.acoustic_score = other.acoustic_score;
        self.insertion_score = other.insertion_score;
        self.language_score = other.language_score;
        self.frame = other.frame;
    }
}

#[derive(Debug, Default)]
pub struct TokenArena {
    tokens: Vec<Token>,
}

impl TokenArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, token: Token) -> TokenId {
        let id = TokenId(self.tokens.len() as u32);
        self.tokens.push(token);
        id
    }

    pub fn get(&self, id: TokenId) -> &Token {
        &self.tokens[id.index()]
    }

    pub fn get_mut(&mut self, id: TokenId) -> &mut Token {
        &mut self.tokens[id.index()]
    }

    pub fn score(&self, id: TokenId) -> f32 {
        self.tokens[id.index()].score
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drop the whole generation of tokens.
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Walk `id` and its predecessors, newest first.
    pub fn chain(&self, id: TokenId) -> Chain<'_> {
        Chain {
            arena: self,
            next: Some(id),
        }
    }

    /// First word token at or before `id`.
    pub fn word_ancestor(&self, id: TokenId) -> Option<TokenId> {
        self.chain(id).find(|&t| self[t].is_word())
    }

    /// Words along the chain ending at `id`, oldest first.
    pub fn words(&self, id: TokenId) -> Vec<(Word, usize)> {
        let mut words: Vec<(Word, usize)> = self
            .chain(id)
            .filter_map(|t| self[t].word().map(|w| (w.clone(), self[t].frame)))
            .collect();
        words.reverse();
        words
    }
}

impl Index<TokenId> for TokenArena {
    type Output = Token;

    fn index(&self, id: TokenId) -> &Token {
        self.get(id)
    }
}

pub struct Chain<'a> {
    arena: &'a TokenArena,
    next: Option<TokenId>,
}

impl Iterator for Chain<'_> {
    type Item = TokenId;

    fn next(&mut self) -> Option<TokenId> {
        let id = self.next?;
        self.next = self.arena[id].predecessor;
        Some(id)
    }
}
