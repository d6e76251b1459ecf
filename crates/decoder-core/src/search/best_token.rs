//! The per-frame "best token for this state" map used for recombination.

use std::collections::HashMap;

use super::state::StateKey;
use super::token::{Token, TokenArena, TokenId};

/// What happened when a candidate was offered for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    /// First token for the state; the caller must add it to an active list.
    Inserted(TokenId),
    /// The resident token was rewritten in place with the candidate.
    /// `displaced` is its previous predecessor.
    Improved {
        resident: TokenId,
        displaced: Option<TokenId>,
    },
    /// The resident token scores at least as well; nothing changed.
    Rejected { resident: TokenId },
}

#[derive(Debug, Default)]
pub(crate) struct BestTokenMap {
    best: HashMap<StateKey, TokenId>,
}

impl BestTokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `candidate` for its state, recombining with the resident token.
    pub fn offer(&mut self, arena: &mut TokenArena, candidate: Token) -> Offer {
        let key = candidate.state().key();
        match self.best.get(&key).copied() {
            None => {
                let id = arena.alloc(candidate);
                self.best.insert(key, id);
                Offer::Inserted(id)
            }
            Some(resident) if candidate.score() > arena.score(resident) => {
                let displaced = arena[resident].predecessor();
                arena.get_mut(resident).update(candidate);
                Offer::Improved {
                    resident,
                    displaced,
                }
            }
            Some(resident) => Offer::Rejected { resident },
        }
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn clear(&mut self) {
        self.best.clear();
    }
}
