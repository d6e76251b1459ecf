use super::alternates::AlternateHypothesisManager;
use super::state::Word;
use super::token::{TokenArena, TokenId};

/// A snapshot of the search after a `recognize` call.
///
/// Borrows the search manager, so it must be consumed (or its lattice built)
/// before recognition continues.
#[derive(Debug, Clone, Copy)]
pub struct SearchResult<'a> {
    arena: &'a TokenArena,
    alternates: Option<&'a AlternateHypothesisManager>,
    active_tokens: &'a [TokenId],
    result_tokens: &'a [TokenId],
    frame: usize,
    is_final: bool,
}

impl<'a> SearchResult<'a> {
    pub fn new(
        arena: &'a TokenArena,
        alternates: Option<&'a AlternateHypothesisManager>,
        active_tokens: &'a [TokenId],
        result_tokens: &'a [TokenId],
        frame: usize,
        is_final: bool,
    ) -> Self {
        Self {
            arena,
            alternates,
            active_tokens,
            result_tokens,
            frame,
            is_final,
        }
    }

    pub fn arena(&self) -> &'a TokenArena {
        self.arena
    }

    pub fn alternates(&self) -> Option<&'a AlternateHypothesisManager> {
        self.alternates
    }

    /// Emitting tokens awaiting the next frame.
    pub fn active_tokens(&self) -> &'a [TokenId] {
        self.active_tokens
    }

    /// Tokens that reached a final state.
    pub fn result_tokens(&self) -> &'a [TokenId] {
        self.result_tokens
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    fn best_of(&self, tokens: &[TokenId]) -> Option<TokenId> {
        tokens
            .iter()
            .copied()
            .max_by(|&a, &b| self.arena.score(a).total_cmp(&self.arena.score(b)))
    }

    pub fn best_final_token(&self) -> Option<TokenId> {
        self.best_of(self.result_tokens)
    }

    pub fn best_active_token(&self) -> Option<TokenId> {
        self.best_of(self.active_tokens)
    }

    /// The best final token, or the best active one for a partial result.
    pub fn best_token(&self) -> Option<TokenId> {
        self.best_final_token().or_else(|| self.best_active_token())
    }

    /// Words on the best path with the frame each was reached at.
    pub fn words(&self) -> Vec<(Word, usize)> {
        self.best_token()
            .map(|id| self.arena.words(id))
            .unwrap_or_default()
    }

    /// Space-separated best hypothesis without fillers.
    pub fn hypothesis(&self) -> String {
        self.words()
            .iter()
            .filter(|(w, _)| !w.is_filler())
            .map(|(w, _)| w.spelling())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
