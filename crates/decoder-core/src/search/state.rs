//! The graph-provider surface: search states, arcs and words.
//!
//! States are produced by an external graph and consumed read-only. What a
//! state can do (emit, end a word, end the utterance) is queried through the
//! `SearchState` trait rather than by inspecting concrete types.

use std::fmt;
use std::sync::Arc;

pub type StateRef = Arc<dyn SearchState>;

/// Acoustic unit (phone) identifier carried by emitting states.
pub type UnitId = u32;

/// Identity of a state within one utterance. Two handles with the same key
/// are the same state for recombination purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(pub u64);

/// Capability tag of a state, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Emitting,
    NonEmitting,
    WordBoundary,
    Final,
}

pub trait SearchState: Send + Sync + fmt::Debug {
    fn key(&self) -> StateKey;

    /// Expansion stage; the highest order holds the emitting states.
    fn order(&self) -> usize;

    fn is_emitting(&self) -> bool;

    fn is_final(&self) -> bool {
        false
    }

    /// The word this state marks a boundary of, if any.
    fn word(&self) -> Option<&Word> {
        None
    }

    /// Acoustic unit scored by this state (emitting states only).
    fn unit(&self) -> Option<UnitId> {
        None
    }

    fn successors(&self) -> Vec<SearchStateArc>;

    fn kind(&self) -> StateKind {
        if self.is_final() {
            StateKind::Final
        } else if self.word().is_some() {
            StateKind::WordBoundary
        } else if self.is_emitting() {
            StateKind::Emitting
        } else {
            StateKind::NonEmitting
        }
    }
}

/// A transition to `state`, scored in the log domain.
#[derive(Debug, Clone)]
pub struct SearchStateArc {
    pub state: StateRef,
    pub language_probability: f32,
    pub insertion_probability: f32,
}

impl SearchStateArc {
    pub fn new(state: StateRef, language_probability: f32, insertion_probability: f32) -> Self {
        Self {
            state,
            language_probability,
            insertion_probability,
        }
    }

    /// Combined arc score.
    pub fn probability(&self) -> f32 {
        self.language_probability + self.insertion_probability
    }
}

/// A dictionary word as seen by the search and the lattice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Word {
    spelling: Arc<str>,
    filler: bool,
}

impl Word {
    pub const SENTENCE_START: &'static str = "<s>";
    pub const SENTENCE_END: &'static str = "</s>";
    pub const SILENCE: &'static str = "<sil>";

    pub fn new(spelling: impl Into<Arc<str>>, filler: bool) -> Self {
        Self {
            spelling: spelling.into(),
            filler,
        }
    }

    /// Build a word from its spelling alone, inferring the filler flag:
    /// `<...>` markers, `[...]` and `++...++` noise words are fillers.
    pub fn from_spelling(spelling: &str) -> Self {
        let filler = (spelling.starts_with('<') && spelling.ends_with('>'))
            || spelling.starts_with('[')
            || spelling.starts_with("++");
        Self::new(spelling, filler)
    }

    pub fn sentence_start() -> Self {
        Self::new(Self::SENTENCE_START, true)
    }

    pub fn sentence_end() -> Self {
        Self::new(Self::SENTENCE_END, true)
    }

    pub fn silence() -> Self {
        Self::new(Self::SILENCE, true)
    }

    pub fn spelling(&self) -> &str {
        &self.spelling
    }

    pub fn is_filler(&self) -> bool {
        self.filler
    }

    pub fn is_sentence_start(&self) -> bool {
        &*self.spelling == Self::SENTENCE_START
    }

    pub fn is_sentence_end(&self) -> bool {
        &*self.spelling == Self::SENTENCE_END
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_inference() {
        assert!(Word::from_spelling("<sil>").is_filler());
        assert!(Word::from_spelling("[noise]").is_filler());
        assert!(Word::from_spelling("++breath++").is_filler());
        assert!(!Word::from_spelling("cat").is_filler());
        assert!(!Word::from_spelling("<cat").is_filler());
    }

    #[test]
    fn sentence_markers() {
        assert!(Word::sentence_start().is_sentence_start());
        assert!(Word::sentence_end().is_sentence_end());
        assert!(Word::from_spelling("</s>").is_sentence_end());
        assert!(!Word::silence().is_sentence_end());
    }
}
