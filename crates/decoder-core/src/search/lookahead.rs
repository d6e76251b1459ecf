//! Fast-match lookahead.
//!
//! A context-independent phone-loop search runs a window of frames ahead of
//! the main search. For every frame it records each unit's best score
//! relative to that frame's best. The main search turns those into
//! per-unit penalties and drops unit entries that cannot stay within the
//! beam once the penalty is applied.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use super::active_list::ActiveListFactory;
use super::pruner::SimplePruner;
use super::state::UnitId;
use super::word_pruning::{SearchConfig, WordPruningSearchManager};
use super::{AcousticScorer, Linguist, SearchError, SearchManager};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookaheadConfig {
    /// Frames of lookahead, starting at the frame about to be scored.
    pub window: usize,
    /// Scale applied to the relative unit scores.
    pub weight: f32,
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        Self {
            window: 5,
            weight: 1.0,
        }
    }
}

impl LookaheadConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            window: settings.lookahead.window,
            weight: settings.lookahead.weight,
        }
    }
}

pub struct FastMatch {
    search: WordPruningSearchManager,
    config: LookaheadConfig,
    /// (feature index, unit -> best score relative to the frame best)
    history: VecDeque<(usize, HashMap<UnitId, f32>)>,
    exhausted: bool,
}

impl FastMatch {
    pub fn new(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        factories: Vec<ActiveListFactory>,
        config: LookaheadConfig,
    ) -> Self {
        let search_config = SearchConfig {
            build_word_lattice: false,
            ..SearchConfig::default()
        };
        Self {
            search: WordPruningSearchManager::new(
                linguist,
                scorer,
                Box::new(SimplePruner),
                factories,
                search_config,
            ),
            config,
            history: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn config(&self) -> &LookaheadConfig {
        &self.config
    }

    pub(crate) fn allocate(&mut self) -> Result<(), SearchError> {
        self.search.allocate()
    }

    pub(crate) fn deallocate(&mut self) {
        self.search.deallocate();
    }

    pub(crate) fn start_recognition(&mut self) -> Result<(), SearchError> {
        self.history.clear();
        self.exhausted = false;
        self.search.start_recognition()
    }

    pub(crate) fn stop_recognition(&mut self) {
        self.search.stop_recognition();
    }

    /// Decode until frames `frame..frame + window` are scored or input runs out.
    pub fn advance_to(&mut self, frame: usize) -> Result<(), SearchError> {
        let target = frame + self.config.window;
        while !self.exhausted && self.search.current_frame() < target {
            let feature = self.search.current_frame();
            if self.search.step()? {
                self.exhausted = true;
                debug!(frames = feature, "fast match exhausted");
                break;
            }
            let Some(list) = self.search.scored_list() else {
                continue;
            };
            let arena = self.search.arena();
            let frame_best = list
                .iter()
                .map(|id| arena.score(id))
                .fold(f32::NEG_INFINITY, f32::max);
            let mut units: HashMap<UnitId, f32> = HashMap::new();
            for id in list.iter() {
                let token = &arena[id];
                if let Some(unit) = token.state().unit() {
                    let relative = token.score() - frame_best;
                    units
                        .entry(unit)
                        .and_modify(|best| *best = best.max(relative))
                        .or_insert(relative);
                }
            }
            self.history.push_back((feature, units));
        }
        while self.history.front().is_some_and(|(f, _)| *f < frame) {
            self.history.pop_front();
        }
        Ok(())
    }

    /// Penalty per unit over the window starting at `frame`. Units the fast
    /// match never reached carry no penalty.
    pub fn penalties(&self, frame: usize) -> HashMap<UnitId, f32> {
        let end = frame + self.config.window;
        let mut penalties: HashMap<UnitId, f32> = HashMap::new();
        for (_, units) in self
            .history
            .iter()
            .filter(|(f, _)| (frame..end).contains(f))
        {
            for (&unit, &relative) in units {
                let penalty = self.config.weight * relative;
                penalties
                    .entry(unit)
                    .and_modify(|p| *p = p.max(penalty))
                    .or_insert(penalty);
            }
        }
        penalties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PhoneLoop;
    use crate::logmath::LogMath;
    use crate::scorer::TableScorer;
    use crate::search::PurgeStrategy;
    use crate::testutil::frames_favouring;

    fn fast_match(window: usize) -> FastMatch {
        let factory =
            ActiveListFactory::new(PurgeStrategy::Sorting, 100, 1e-80, &LogMath::natural());
        FastMatch::new(
            Box::new(PhoneLoop::new(&[1, 2, 3, 4]).build().unwrap()),
            Box::new(TableScorer::new(frames_favouring(&[1, 2, 3, 4], -10.0))),
            vec![factory],
            LookaheadConfig { window, weight: 1.0 },
        )
    }

    #[test]
    fn favoured_unit_has_no_penalty() {
        let mut fm = fast_match(1);
        fm.allocate().unwrap();
        fm.start_recognition().unwrap();
        fm.advance_to(0).unwrap();
        let penalties = fm.penalties(0);
        assert_eq!(penalties[&1], 0.0);
        assert!((penalties[&3] + 9.0).abs() < 1e-4);
    }

    #[test]
    fn window_takes_best_over_frames() {
        let mut fm = fast_match(4);
        fm.allocate().unwrap();
        fm.start_recognition().unwrap();
        fm.advance_to(0).unwrap();
        let penalties = fm.penalties(0);
        for unit in 1..=4 {
            assert!(penalties[&unit].abs() < 1e-4, "unit {unit}: {penalties:?}");
        }
    }

    #[test]
    fn runs_out_of_input_quietly() {
        let mut fm = fast_match(3);
        fm.allocate().unwrap();
        fm.start_recognition().unwrap();
        fm.advance_to(10).unwrap();
        assert!(fm.penalties(10).is_empty());
    }
}
