use super::active_list::ActiveList;
use super::token::TokenArena;

/// Trims the scored emitting list before growth.
pub trait Pruner: Send {
    fn allocate(&mut self) {}

    fn deallocate(&mut self) {}

    fn start_recognition(&mut self) {}

    fn stop_recognition(&mut self) {}

    fn prune(&mut self, list: ActiveList, arena: &TokenArena) -> ActiveList;
}

/// Applies the list's own absolute beam.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplePruner;

impl Pruner for SimplePruner {
    fn prune(&mut self, mut list: ActiveList, arena: &TokenArena) -> ActiveList {
        list.purge(arena);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logmath::LogMath;
    use crate::search::{ActiveListFactory, PurgeStrategy};
    use crate::testutil::arena_with_scores;

    #[test]
    fn simple_pruner_purges() {
        let (arena, ids) = arena_with_scores(&[-3.0, -1.0, -2.0]);
        let mut list =
            ActiveListFactory::new(PurgeStrategy::Sorting, 2, 1e-80, &LogMath::natural())
                .new_instance();
        for &id in &ids {
            list.add(&arena, id);
        }
        let pruned = SimplePruner.prune(list, &arena);
        assert_eq!(pruned.tokens(), &[ids[1], ids[2]]);
    }
}
