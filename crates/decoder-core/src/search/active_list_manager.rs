//! One active list per state order.
//!
//! Orders `0..n-1` hold non-emitting states and are drained in ascending
//! order during growth; the last order holds the emitting states scored on
//! the next frame.

use tracing::warn;

use super::active_list::{ActiveList, ActiveListFactory};
use super::token::{TokenArena, TokenId};
use super::SearchError;

#[derive(Debug)]
pub struct ActiveListManager {
    factories: Vec<ActiveListFactory>,
    check_prior_lists_empty: bool,
    lists: Vec<ActiveList>,
}

impl ActiveListManager {
    pub fn new(factories: Vec<ActiveListFactory>, check_prior_lists_empty: bool) -> Self {
        Self {
            factories,
            check_prior_lists_empty,
            lists: Vec::new(),
        }
    }

    /// Allocate `n` fresh lists. Missing factories are padded with the last.
    pub fn set_num_state_order(&mut self, n: usize) -> Result<(), SearchError> {
        let Some(&last) = self.factories.last() else {
            return Err(SearchError::NoActiveListFactories);
        };
        if n == 0 {
            return Err(SearchError::EmptyStateOrder);
        }
        if self.factories.len() != n {
            warn!(
                factories = self.factories.len(),
                orders = n,
                "active list factory count does not match state orders"
            );
        }
        self.lists = (0..n)
            .map(|i| self.factories.get(i).copied().unwrap_or(last).new_instance())
            .collect();
        Ok(())
    }

    pub fn num_state_order(&self) -> usize {
        self.lists.len()
    }

    /// Route `id` to the list matching its state order.
    pub fn add(&mut self, arena: &TokenArena, id: TokenId) -> Result<(), SearchError> {
        let order = arena[id].state().order();
        let num_state_order = self.lists.len();
        let list = self
            .lists
            .get_mut(order)
            .ok_or(SearchError::UnknownStateOrder {
                order,
                num_state_order,
            })?;
        list.add(arena, id);
        Ok(())
    }

    /// Re-evaluate the best token of `id`'s list after an in-place update.
    pub fn note_improved(&mut self, arena: &TokenArena, id: TokenId) {
        let order = arena[id].state().order();
        if let Some(list) = self.lists.get_mut(order) {
            list.observe(arena, id);
        }
    }

    fn emitting_index(&self) -> Result<usize, SearchError> {
        self.lists
            .len()
            .checked_sub(1)
            .ok_or(SearchError::NotReady("active list manager has no state orders"))
    }

    pub fn emitting_list(&self) -> Option<&ActiveList> {
        self.lists.last()
    }

    /// Take the emitting list, leaving a fresh empty one in its place.
    pub fn take_emitting_list(&mut self) -> Result<ActiveList, SearchError> {
        let index = self.emitting_index()?;
        let fresh = self.lists[index].new_instance();
        Ok(std::mem::replace(&mut self.lists[index], fresh))
    }

    pub fn replace_emitting_list(&mut self, list: ActiveList) -> Result<(), SearchError> {
        let index = self.emitting_index()?;
        self.lists[index] = list;
        Ok(())
    }

    pub fn clear_emitting_list(&mut self) -> Result<(), SearchError> {
        self.take_emitting_list().map(|_| ())
    }

    /// Orders of the non-emitting lists, in the order they must be drained.
    pub fn non_emitting_orders(&self) -> std::ops::Range<usize> {
        0..self.lists.len().saturating_sub(1)
    }

    /// Take the non-emitting list for `order`. With the prior-list check on,
    /// every lower order must already be empty: a leftover token means the
    /// graph looped back to an earlier stage.
    pub fn take_non_emitting_list(&mut self, order: usize) -> Result<ActiveList, SearchError> {
        if order >= self.non_emitting_orders().end {
            return Err(SearchError::UnknownStateOrder {
                order,
                num_state_order: self.lists.len(),
            });
        }
        if self.check_prior_lists_empty {
            if let Some((pending, list)) = self.lists[..order]
                .iter()
                .enumerate()
                .find(|(_, l)| !l.is_empty())
            {
                return Err(SearchError::PriorListNotEmpty {
                    processing: order,
                    pending,
                    size: list.len(),
                });
            }
        }
        let fresh = self.lists[order].new_instance();
        Ok(std::mem::replace(&mut self.lists[order], fresh))
    }

    /// Total tokens across every list.
    pub fn len(&self) -> usize {
        self.lists.iter().map(ActiveList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(ActiveList::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logmath::LogMath;
    use crate::search::{PurgeStrategy, Token};
    use crate::testutil::{emitting_state, non_emitting_state};

    fn factory(width: usize) -> ActiveListFactory {
        ActiveListFactory::new(PurgeStrategy::Simple, width, 1e-80, &LogMath::natural())
    }

    #[test]
    fn pads_with_last_factory() {
        let mut manager = ActiveListManager::new(vec![factory(1), factory(7)], false);
        manager.set_num_state_order(4).unwrap();
        assert_eq!(manager.num_state_order(), 4);
        assert_eq!(manager.non_emitting_orders(), 0..3);
        assert_eq!(manager.emitting_list().unwrap().absolute_beam_width(), 7);
    }

    #[test]
    fn rejects_missing_factories() {
        let mut manager = ActiveListManager::new(Vec::new(), false);
        assert!(matches!(
            manager.set_num_state_order(2),
            Err(SearchError::NoActiveListFactories)
        ));
    }

    #[test]
    fn routes_by_order() {
        let mut arena = TokenArena::new();
        let mut manager = ActiveListManager::new(vec![factory(0)], false);
        manager.set_num_state_order(2).unwrap();
        let ne = arena.alloc(Token::new(None, non_emitting_state(1, 0), -1.0, 0.0, 0.0, 0));
        let em = arena.alloc(Token::new(None, emitting_state(2, 1), -2.0, 0.0, 0.0, 0));
        manager.add(&arena, ne).unwrap();
        manager.add(&arena, em).unwrap();
        assert_eq!(manager.emitting_list().unwrap().tokens(), &[em]);
        assert_eq!(manager.take_non_emitting_list(0).unwrap().tokens(), &[ne]);
        assert!(manager.take_non_emitting_list(0).unwrap().is_empty());
        let emitting = manager.take_emitting_list().unwrap();
        assert_eq!(emitting.tokens(), &[em]);
        assert!(manager.is_empty());
    }

    #[test]
    fn unknown_order_is_an_error() {
        let mut arena = TokenArena::new();
        let mut manager = ActiveListManager::new(vec![factory(0)], false);
        manager.set_num_state_order(2).unwrap();
        let far = arena.alloc(Token::new(None, non_emitting_state(1, 5), -1.0, 0.0, 0.0, 0));
        assert!(matches!(
            manager.add(&arena, far),
            Err(SearchError::UnknownStateOrder { order: 5, .. })
        ));
    }

    #[test]
    fn prior_list_check_detects_leftovers() {
        let mut arena = TokenArena::new();
        let mut manager = ActiveListManager::new(vec![factory(0)], true);
        manager.set_num_state_order(3).unwrap();
        let early = arena.alloc(Token::new(None, non_emitting_state(1, 0), -1.0, 0.0, 0.0, 0));
        manager.add(&arena, early).unwrap();
        let err = manager.take_non_emitting_list(1).unwrap_err();
        assert!(matches!(
            err,
            SearchError::PriorListNotEmpty {
                processing: 1,
                pending: 0,
                size: 1
            }
        ));
    }
}
