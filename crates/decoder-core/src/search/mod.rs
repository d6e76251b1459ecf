//! Beam-pruned token-passing search.
//!
//! The search consumes an external graph (`Linguist`) and an external
//! acoustic scorer (`AcousticScorer`), and keeps one active list per state
//! order. Each frame it scores the emitting list, prunes it, then grows
//! every surviving token across the graph, recombining tokens that meet in
//! the same state.

mod active_list;
mod active_list_manager;
mod alternates;
mod best_token;
mod lookahead;
mod partition;
mod pruner;
mod result;
mod state;
mod token;
mod word_pruning;


pub use active_list::{ActiveList, ActiveListFactory, PurgeStrategy};
pub use active_list_manager::ActiveListManager;
pub use alternates::AlternateHypothesisManager;
pub use lookahead::{FastMatch, LookaheadConfig};
pub use partition::{Partitioner, DEFAULT_MAX_DEPTH};
pub use pruner::{Pruner, SimplePruner};
pub use result::SearchResult;
pub use state::{SearchState, SearchStateArc, StateKey, StateKind, StateRef, UnitId, Word};
pub use token::{Chain, Token, TokenArena, TokenId};
pub use word_pruning::{SearchConfig, SearchStats, WordPruningSearchManager};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(
        "state order violation: {from_state} (order {from_order}) -> {to_state} (order {to_order})"
    )]
    StateOrder {
        from_order: usize,
        to_order: usize,
        from_state: String,
        to_state: String,
    },
    #[error(
        "active list for order {pending} still holds {size} tokens while processing order {processing}"
    )]
    PriorListNotEmpty {
        processing: usize,
        pending: usize,
        size: usize,
    },
    #[error("no active list factories configured")]
    NoActiveListFactories,
    #[error("state order {order} out of range (graph has {num_state_order})")]
    UnknownStateOrder {
        order: usize,
        num_state_order: usize,
    },
    #[error("graph reports zero state orders")]
    EmptyStateOrder,
    #[error("search not ready: {0}")]
    NotReady(&'static str),
}

/// The graph provider.
pub trait Linguist: Send {
    fn allocate(&mut self) -> Result<(), SearchError> {
        Ok(())
    }

    fn deallocate(&mut self) {}

    fn start_recognition(&mut self) {}

    fn stop_recognition(&mut self) {}

    fn initial_state(&self) -> StateRef;

    /// Number of state orders; the last one holds the emitting states.
    fn num_state_order(&self) -> usize;
}

/// Outcome of scoring one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// Frame scored; the best scoring token.
    Best(TokenId),
    /// No frame left for this utterance. The result is final.
    UtteranceEnd,
    /// The input stream is exhausted; there is nothing left to report.
    StreamEnd,
}

/// Scores emitting tokens against the next feature frame.
pub trait AcousticScorer: Send {
    fn allocate(&mut self) {}

    fn deallocate(&mut self) {}

    fn start_recognition(&mut self) {}

    fn stop_recognition(&mut self) {}

    /// Add the acoustic score of the next frame to every token in `tokens`.
    fn calculate_scores(&mut self, arena: &mut TokenArena, tokens: &[TokenId]) -> ScoreOutcome;
}

pub trait SearchManager {
    fn allocate(&mut self) -> Result<(), SearchError>;

    fn deallocate(&mut self);

    fn start_recognition(&mut self) -> Result<(), SearchError>;

    fn stop_recognition(&mut self);

    /// Decode up to `n_frames` frames. Returns `None` once the input stream
    /// has ended.
    fn recognize(&mut self, n_frames: usize) -> Result<Option<SearchResult<'_>>, SearchError>;
}
