//! The bounded frontier of tokens for one expansion stage.
//!
//! `add` is O(1) and tracks the running best. `purge` enforces the absolute
//! beam with one of several strategies; the relative beam is only reported
//! through `beam_threshold` and applied by whoever grows the list.

use std::collections::HashMap;

use serde::Deserialize;

use super::partition::Partitioner;
use super::token::{TokenArena, TokenId};
use crate::logmath::{LogMath, LOG_ZERO};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurgeStrategy {
    /// Full unstable sort, then truncate.
    Simple,
    /// Stable sort with ties broken by insertion order, then truncate.
    Sorting,
    /// Quickselect of the top tokens in expected linear time.
    Partition,
    /// Sorting, plus per-word and filler caps on word tokens.
    Word,
}

/// Builds fresh, identically configured active lists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveListFactory {
    pub strategy: PurgeStrategy,
    /// 0 disables the absolute beam.
    pub absolute_beam_width: usize,
    pub log_relative_beam_width: f32,
    /// 0 disables the cap (word strategy only).
    pub max_paths_per_word: usize,
    /// 0 disables the cap (word strategy only).
    pub max_filler_words: usize,
}

impl ActiveListFactory {
    pub fn new(
        strategy: PurgeStrategy,
        absolute_beam_width: usize,
        relative_beam_width: f64,
        log_math: &LogMath,
    ) -> Self {
        Self {
            strategy,
            absolute_beam_width,
            log_relative_beam_width: log_math.linear_to_log(relative_beam_width),
            max_paths_per_word: 0,
            max_filler_words: 0,
        }
    }

    pub fn from_settings(settings: &Settings, log_math: &LogMath) -> Self {
        Self {
            max_paths_per_word: settings.active_list.max_paths_per_word,
            max_filler_words: settings.active_list.max_filler_words,
            ..Self::new(
                settings.active_list.strategy,
                settings.search.absolute_beam_width,
                settings.search.relative_beam_width,
                log_math,
            )
        }
    }

    pub fn with_word_caps(mut self, max_paths_per_word: usize, max_filler_words: usize) -> Self {
        self.max_paths_per_word = max_paths_per_word;
        self.max_filler_words = max_filler_words;
        self
    }

    pub fn new_instance(&self) -> ActiveList {
        ActiveList {
            factory: *self,
            tokens: Vec::new(),
            best_score: LOG_ZERO,
            best_token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveList {
    factory: ActiveListFactory,
    tokens: Vec<TokenId>,
    best_score: f32,
    best_token: Option<TokenId>,
}

impl ActiveList {
    pub fn add(&mut self, arena: &TokenArena, id: TokenId) {
        self.tokens.push(id);
        self.observe(arena, id);
    }

    /// Refresh the running best after `id`'s score changed in place.
    pub fn observe(&mut self, arena: &TokenArena, id: TokenId) {
        let score = arena.score(id);
        if self.best_token.is_none() || score > self.best_score {
            self.best_score = score;
            self.best_token = Some(id);
        }
    }

    /// Record the best token as reported by the scorer.
    pub fn set_best_token(&mut self, arena: &TokenArena, id: TokenId) {
        self.best_token = Some(id);
        self.best_score = arena.score(id);
    }

    pub fn best_token(&self) -> Option<TokenId> {
        self.best_token
    }

    pub fn best_score(&self) -> f32 {
        self.best_score
    }

    /// Tokens scoring below this fall outside the relative beam.
    pub fn beam_threshold(&self) -> f32 {
        if self.best_score <= LOG_ZERO {
            return f32::NEG_INFINITY;
        }
        self.best_score + self.factory.log_relative_beam_width
    }

    pub fn absolute_beam_width(&self) -> usize {
        self.factory.absolute_beam_width
    }

    pub fn log_relative_beam_width(&self) -> f32 {
        self.factory.log_relative_beam_width
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn iter(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.tokens.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// An empty list with the same configuration.
    pub fn new_instance(&self) -> ActiveList {
        self.factory.new_instance()
    }

    /// Enforce the absolute beam, keeping the highest-scoring tokens.
    pub fn purge(&mut self, arena: &TokenArena) {
        let width = self.factory.absolute_beam_width;
        match self.factory.strategy {
            PurgeStrategy::Simple => {
                if width > 0 && self.tokens.len() > width {
                    self.tokens
                        .sort_unstable_by(|&a, &b| arena.score(b).total_cmp(&arena.score(a)));
                    self.tokens.truncate(width);
                }
            }
            PurgeStrategy::Sorting => {
                if width > 0 && self.tokens.len() > width {
                    self.sort_stable(arena);
                    self.tokens.truncate(width);
                }
            }
            PurgeStrategy::Partition => {
                if width > 0 && self.tokens.len() > width {
                    let size = self.tokens.len();
                    let kept = Partitioner::default().partition(
                        &mut self.tokens,
                        size,
                        width,
                        |&id| arena.score(id),
                    );
                    self.tokens.truncate(kept);
                }
            }
            PurgeStrategy::Word => self.purge_words(arena, width),
        }
    }

    fn sort_stable(&mut self, arena: &TokenArena) {
        self.tokens.sort_by(|&a, &b| {
            arena
                .score(b)
                .total_cmp(&arena.score(a))
                .then_with(|| a.cmp(&b))
        });
    }

    fn purge_words(&mut self, arena: &TokenArena, width: usize) {
        self.sort_stable(arena);
        let max_paths = self.factory.max_paths_per_word;
        let max_fillers = self.factory.max_filler_words;
        let mut fillers = 0usize;
        let mut per_word: HashMap<String, usize> = HashMap::new();
        self.tokens.retain(|&id| {
            let Some(word) = arena[id].word() else {
                return true;
            };
            if max_fillers > 0 && word.is_filler() {
                if fillers >= max_fillers {
                    return false;
                }
                fillers += 1;
            }
            if max_paths > 0 {
                let count = per_word.entry(word.spelling().to_string()).or_insert(0);
                if *count >= max_paths {
                    return false;
                }
                *count += 1;
            }
            true
        });
        if width > 0 {
            self.tokens.truncate(width);
        }
    }
}
