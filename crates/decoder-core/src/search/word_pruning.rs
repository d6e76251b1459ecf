//! Word-pruning breadth-first search.
//!
//! Per frame: score the emitting list, prune it, then grow. Growth expands
//! the surviving emitting tokens, then drains the non-emitting lists one
//! state order at a time, best token first; successors landing in the order
//! being drained join its queue. Every new token goes through the per-frame best
//! token map, so each state holds a single token per frame; a better path
//! into an occupied state rewrites the resident token in place.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::{debug, debug_span, warn};

use super::active_list::{ActiveList, ActiveListFactory};
use super::active_list_manager::ActiveListManager;
use super::alternates::AlternateHypothesisManager;
use super::best_token::{BestTokenMap, Offer};
use super::lookahead::FastMatch;
use super::pruner::Pruner;
use super::result::SearchResult;
use super::state::{SearchState, StateKey, UnitId};
use super::token::{Token, TokenArena, TokenId};
use super::{AcousticScorer, Linguist, ScoreOutcome, SearchError, SearchManager};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    /// Skip growth every N-th frame; 0 never skips.
    pub grow_skip_interval: usize,
    /// Fail on transitions to a lower state order and on leftover tokens
    /// in already drained lists.
    pub check_state_order: bool,
    /// Record alternate predecessors for lattice building. Tokens then keep
    /// their full chains: the lattice builder sums the scores between word
    /// tokens itself, so no summary tokens are created.
    pub build_word_lattice: bool,
    /// Link every token to its immediate predecessor instead of the
    /// nearest word token. Always the case with `build_word_lattice`.
    pub keep_all_tokens: bool,
    pub max_lattice_edges: usize,
    /// 0 disables acoustic lookahead.
    pub acoustic_lookahead_frames: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            grow_skip_interval: 0,
            check_state_order: false,
            build_word_lattice: true,
            keep_all_tokens: false,
            max_lattice_edges: 100,
            acoustic_lookahead_frames: 0.0,
        }
    }
}

impl SearchConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let s = &settings.search;
        Self {
            grow_skip_interval: s.grow_skip_interval,
            check_state_order: s.check_state_order,
            build_word_lattice: s.build_word_lattice,
            keep_all_tokens: s.keep_all_tokens,
            max_lattice_edges: s.max_lattice_edges,
            acoustic_lookahead_frames: s.acoustic_lookahead_frames,
        }
    }
}

/// Per-utterance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub frames: usize,
    pub tokens_created: usize,
    pub tokens_scored: usize,
    pub tokens_pruned: usize,
    pub tokens_recombined: usize,
    pub alternates_recorded: usize,
    pub lookahead_pruned: usize,
}

/// A token waiting to be grown, ordered by the score it was queued with.
#[derive(Debug, Clone, Copy)]
struct Queued {
    score: f32,
    id: TokenId,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Ties go to the earlier token.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Allocated,
    Recognizing,
}

pub struct WordPruningSearchManager {
    linguist: Box<dyn Linguist>,
    scorer: Box<dyn AcousticScorer>,
    pruner: Box<dyn Pruner>,
    lists: ActiveListManager,
    config: SearchConfig,
    fast_match: Option<Box<FastMatch>>,
    penalties: HashMap<UnitId, f32>,
    arena: TokenArena,
    alternates: Option<AlternateHypothesisManager>,
    best_tokens: BestTokenMap,
    grown_states: HashSet<StateKey>,
    /// The non-emitting order being drained, if any.
    draining: Option<usize>,
    /// The emitting list scored on the current frame.
    scored: Option<ActiveList>,
    result_list: Vec<TokenId>,
    num_state_order: usize,
    current_frame: usize,
    stream_end: bool,
    phase: Phase,
    stats: SearchStats,
}

impl WordPruningSearchManager {
    pub fn new(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        pruner: Box<dyn Pruner>,
        factories: Vec<ActiveListFactory>,
        config: SearchConfig,
    ) -> Self {
        Self {
            linguist,
            scorer,
            pruner,
            lists: ActiveListManager::new(factories, config.check_state_order),
            config,
            fast_match: None,
            penalties: HashMap::new(),
            arena: TokenArena::new(),
            alternates: None,
            best_tokens: BestTokenMap::new(),
            grown_states: HashSet::new(),
            draining: None,
            scored: None,
            result_list: Vec::new(),
            num_state_order: 0,
            current_frame: 0,
            stream_end: false,
            phase: Phase::Idle,
            stats: SearchStats::default(),
        }
    }

    /// Prune unit entries with a phone-loop search running ahead of this one.
    pub fn with_fast_match(mut self, fast_match: FastMatch) -> Self {
        self.fast_match = Some(Box::new(fast_match));
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn arena(&self) -> &TokenArena {
        &self.arena
    }

    pub fn alternates(&self) -> Option<&AlternateHypothesisManager> {
        self.alternates.as_ref()
    }

    /// The emitting list scored and pruned on the latest frame.
    pub(crate) fn scored_list(&self) -> Option<&ActiveList> {
        self.scored.as_ref()
    }

    /// Decode one frame. Returns `true` when no frame was decoded.
    pub(crate) fn step(&mut self) -> Result<bool, SearchError> {
        if self.phase != Phase::Recognizing {
            return Err(SearchError::NotReady("recognize called before start_recognition"));
        }
        self.recognize_frame()
    }

    fn recognize_frame(&mut self) -> Result<bool, SearchError> {
        let more = self.score_tokens()?;
        if more {
            self.prune_branches();
            self.current_frame += 1;
            self.stats.frames += 1;
            let skip = self.config.grow_skip_interval;
            if skip == 0 || self.current_frame % skip != 0 {
                self.grow_frame()?;
            } else if let Some(scored) = self.scored.take() {
                // Skipped frame: the same tokens are scored again next frame.
                self.lists.replace_emitting_list(scored)?;
            }
        }
        Ok(!more)
    }

    fn score_tokens(&mut self) -> Result<bool, SearchError> {
        let mut list = self.lists.take_emitting_list()?;
        if list.is_empty() {
            self.lists.replace_emitting_list(list)?;
            return Ok(false);
        }
        match self.scorer.calculate_scores(&mut self.arena, list.tokens()) {
            ScoreOutcome::Best(best) => {
                self.stats.tokens_scored += list.len();
                list.set_best_token(&self.arena, best);
                self.scored = Some(list);
                Ok(true)
            }
            ScoreOutcome::UtteranceEnd => {
                self.lists.replace_emitting_list(list)?;
                Ok(false)
            }
            ScoreOutcome::StreamEnd => {
                self.stream_end = true;
                self.lists.replace_emitting_list(list)?;
                Ok(false)
            }
        }
    }

    fn prune_branches(&mut self) {
        if let Some(list) = self.scored.take() {
            self.scored = Some(self.prune(list));
        }
    }

    fn prune(&mut self, list: ActiveList) -> ActiveList {
        let before = list.len();
        let pruned = self.pruner.prune(list, &self.arena);
        self.stats.tokens_pruned += before.saturating_sub(pruned.len());
        pruned
    }

    fn clear_collectors(&mut self) -> Result<(), SearchError> {
        self.result_list.clear();
        self.best_tokens.clear();
        self.grown_states.clear();
        self.lists.clear_emitting_list()
    }

    fn grow_frame(&mut self) -> Result<(), SearchError> {
        let _span = debug_span!("grow_branches", frame = self.current_frame).entered();
        let created = self.stats.tokens_created;
        self.clear_collectors()?;
        self.prepare_lookahead()?;
        if let Some(scored) = self.scored.take() {
            let grown = self.grow_emitting_branches(&scored);
            self.scored = Some(scored);
            grown?;
        }
        self.grow_non_emitting_branches()?;
        debug!(
            created = self.stats.tokens_created - created,
            emitting = self.lists.emitting_list().map_or(0, ActiveList::len),
            results = self.result_list.len(),
            "frame grown"
        );
        Ok(())
    }

    fn grow_emitting_branches(&mut self, list: &ActiveList) -> Result<(), SearchError> {
        let lookahead = self.config.acoustic_lookahead_frames;
        if lookahead <= 0.0 {
            return self.grow_from(list, list.beam_threshold());
        }
        let arena = &self.arena;
        let ranked = |id: TokenId| arena.score(id) + arena[id].acoustic_score() * lookahead;
        let best = list.iter().map(ranked).fold(f32::NEG_INFINITY, f32::max);
        let threshold = best + list.log_relative_beam_width();
        let selected: Vec<TokenId> = list.iter().filter(|&id| ranked(id) > threshold).collect();
        let beam = list.beam_threshold();
        for id in selected {
            self.collect_successor_tokens(id, beam)?;
        }
        Ok(())
    }

    fn grow_non_emitting_branches(&mut self) -> Result<(), SearchError> {
        for order in self.lists.non_emitting_orders() {
            let list = self.lists.take_non_emitting_list(order)?;
            if list.is_empty() {
                continue;
            }
            let list = self.prune(list);
            self.draining = Some(order);
            let drained = self.drain_order(order, &list);
            self.draining = None;
            drained?;
        }
        Ok(())
    }

    /// Grow one non-emitting order best first. Successors in the same order
    /// are queued and grown in this frame too, so a state is grown once with
    /// its final score as long as arc scores are not positive.
    fn drain_order(&mut self, order: usize, list: &ActiveList) -> Result<(), SearchError> {
        let threshold = list.beam_threshold();
        let mut queue: BinaryHeap<Queued> = list.iter().map(|id| self.queued(id)).collect();
        // A requeued token pops first with its better score; later entries are stale.
        let mut popped = HashSet::new();
        while let Some(Queued { id, .. }) = queue.pop() {
            if self.arena.score(id) < threshold || !popped.insert(id) {
                continue;
            }
            self.collect_successor_tokens(id, threshold)?;
            let arrived = self.lists.take_non_emitting_list(order)?;
            queue.extend(arrived.iter().map(|id| self.queued(id)));
        }
        Ok(())
    }

    fn queued(&self, id: TokenId) -> Queued {
        Queued {
            score: self.arena.score(id),
            id,
        }
    }

    fn grow_from(&mut self, list: &ActiveList, threshold: f32) -> Result<(), SearchError> {
        for id in list.iter() {
            if self.arena.score(id) >= threshold {
                self.collect_successor_tokens(id, threshold)?;
            }
        }
        Ok(())
    }

    /// The token successors of `id` link back to: `id` itself for word
    /// tokens and full chains, else its word ancestor.
    fn result_list_predecessor(&self, id: TokenId) -> Option<TokenId> {
        let token = &self.arena[id];
        if self.config.keep_all_tokens || self.config.build_word_lattice || token.is_word() {
            Some(id)
        } else {
            token.predecessor()
        }
    }

    fn collect_successor_tokens(&mut self, id: TokenId, threshold: f32) -> Result<(), SearchError> {
        let token = &self.arena[id];
        if token.is_final() {
            let kept = self.result_list_predecessor(id).unwrap_or(id);
            self.result_list.push(kept);
            return Ok(());
        }
        let state = token.state().clone();
        let score = token.score();
        // A non-emitting state grows at most once per frame.
        if !state.is_emitting() && !self.grown_states.insert(state.key()) {
            return Ok(());
        }
        let predecessor = self.result_list_predecessor(id);

        for arc in state.successors() {
            let next = &arc.state;
            if self.config.check_state_order {
                self.check_state_order(state.as_ref(), next.as_ref())?;
            }
            let entry = score + arc.probability();
            if let Some(penalty) = self.lookahead_penalty(state.as_ref(), next.as_ref()) {
                if entry + penalty < threshold {
                    self.stats.lookahead_pruned += 1;
                    continue;
                }
            }
            let is_word = next.word().is_some();
            let candidate = Token::new(
                predecessor,
                next.clone(),
                entry,
                arc.insertion_probability,
                arc.language_probability,
                self.current_frame,
            );
            match self.best_tokens.offer(&mut self.arena, candidate) {
                Offer::Inserted(new_id) => {
                    self.stats.tokens_created += 1;
                    self.lists.add(&self.arena, new_id)?;
                }
                Offer::Improved {
                    resident,
                    displaced,
                } => {
                    self.stats.tokens_recombined += 1;
                    self.lists.note_improved(&self.arena, resident);
                    // Requeue with the better score if its order is draining.
                    if self.draining == Some(next.order())
                        && !next.is_emitting()
                        && !self.grown_states.contains(&next.key())
                    {
                        self.lists.add(&self.arena, resident)?;
                    }
                    if let (true, Some(displaced)) = (is_word, displaced) {
                        self.record_alternate(resident, displaced);
                    }
                }
                Offer::Rejected { resident } => {
                    // Losing word entries still belong in the lattice.
                    if let (true, Some(predecessor)) = (is_word, predecessor) {
                        self.record_alternate(resident, predecessor);
                    }
                }
            }
        }
        Ok(())
    }

    fn record_alternate(&mut self, token: TokenId, predecessor: TokenId) {
        if let Some(alternates) = self.alternates.as_mut() {
            alternates.add_alternate_predecessor(&self.arena, token, predecessor);
            self.stats.alternates_recorded += 1;
        }
    }

    fn check_state_order(
        &self,
        from: &dyn SearchState,
        to: &dyn SearchState,
    ) -> Result<(), SearchError> {
        // Emitting states loop back to the earliest orders.
        if from.order() + 1 == self.num_state_order {
            return Ok(());
        }
        if from.order() > to.order() {
            return Err(SearchError::StateOrder {
                from_order: from.order(),
                to_order: to.order(),
                from_state: format!("{from:?}"),
                to_state: format!("{to:?}"),
            });
        }
        Ok(())
    }

    fn prepare_lookahead(&mut self) -> Result<(), SearchError> {
        if let Some(fast_match) = self.fast_match.as_mut() {
            fast_match.advance_to(self.current_frame)?;
            self.penalties = fast_match.penalties(self.current_frame);
        }
        Ok(())
    }

    /// Lookahead penalty for entering `to`'s unit from `from`, if any applies.
    fn lookahead_penalty(&self, from: &dyn SearchState, to: &dyn SearchState) -> Option<f32> {
        self.fast_match.as_ref()?;
        let unit = to.unit()?;
        if from.unit() == Some(unit) {
            return None;
        }
        Some(self.penalties.get(&unit).copied().unwrap_or(0.0))
    }
}

impl SearchManager for WordPruningSearchManager {
    fn allocate(&mut self) -> Result<(), SearchError> {
        self.linguist.allocate()?;
        self.pruner.allocate();
        self.scorer.allocate();
        if let Some(fast_match) = self.fast_match.as_mut() {
            fast_match.allocate()?;
        }
        self.phase = Phase::Allocated;
        Ok(())
    }

    fn deallocate(&mut self) {
        if let Some(fast_match) = self.fast_match.as_mut() {
            fast_match.deallocate();
        }
        self.scorer.deallocate();
        self.pruner.deallocate();
        self.linguist.deallocate();
        self.arena.clear();
        self.phase = Phase::Idle;
    }

    fn start_recognition(&mut self) -> Result<(), SearchError> {
        if self.phase == Phase::Idle {
            return Err(SearchError::NotReady("start_recognition called before allocate"));
        }
        self.linguist.start_recognition();
        self.pruner.start_recognition();
        self.scorer.start_recognition();
        if let Some(fast_match) = self.fast_match.as_mut() {
            fast_match.start_recognition()?;
        }

        self.arena.clear();
        self.scored = None;
        self.penalties.clear();
        self.current_frame = 0;
        self.stream_end = false;
        self.stats = SearchStats::default();
        self.num_state_order = self.linguist.num_state_order();
        self.lists.set_num_state_order(self.num_state_order)?;
        self.alternates = self
            .config
            .build_word_lattice
            .then(|| AlternateHypothesisManager::new(self.config.max_lattice_edges));

        let initial = self
            .arena
            .alloc(Token::initial(self.linguist.initial_state()));
        self.stats.tokens_created += 1;
        let mut seed = self
            .lists
            .emitting_list()
            .map(ActiveList::new_instance)
            .ok_or(SearchError::NotReady("no active lists allocated"))?;
        seed.add(&self.arena, initial);

        self.phase = Phase::Recognizing;
        self.clear_collectors()?;
        self.prepare_lookahead()?;
        self.grow_from(&seed, seed.beam_threshold())?;
        self.grow_non_emitting_branches()?;
        debug!(
            orders = self.num_state_order,
            emitting = self.lists.emitting_list().map_or(0, ActiveList::len),
            "recognition started"
        );
        Ok(())
    }

    fn stop_recognition(&mut self) {
        if let Some(fast_match) = self.fast_match.as_mut() {
            fast_match.stop_recognition();
        }
        self.scorer.stop_recognition();
        self.pruner.stop_recognition();
        self.linguist.stop_recognition();
        let stats = self.stats;
        debug!(
            frames = stats.frames,
            created = stats.tokens_created,
            scored = stats.tokens_scored,
            pruned = stats.tokens_pruned,
            recombined = stats.tokens_recombined,
            alternates = stats.alternates_recorded,
            lookahead_pruned = stats.lookahead_pruned,
            "recognition stopped"
        );
        if self.phase == Phase::Recognizing {
            self.phase = Phase::Allocated;
        }
    }

    fn recognize(&mut self, n_frames: usize) -> Result<Option<SearchResult<'_>>, SearchError> {
        if self.phase != Phase::Recognizing {
            return Err(SearchError::NotReady("recognize called before start_recognition"));
        }
        let _span = debug_span!("recognize", n_frames, frame = self.current_frame).entered();
        let mut done = false;
        for _ in 0..n_frames {
            done = self.recognize_frame()?;
            if done {
                break;
            }
        }
        if self.stream_end {
            debug!(frame = self.current_frame, "stream ended");
            return Ok(None);
        }
        if let Some(alternates) = self.alternates.as_mut() {
            alternates.purge(&self.arena);
        }
        if done && self.result_list.is_empty() {
            warn!(frame = self.current_frame, "no token reached a final state");
        }
        let active = self.lists.emitting_list().map_or(&[][..], ActiveList::tokens);
        Ok(Some(SearchResult::new(
            &self.arena,
            self.alternates.as_ref(),
            active,
            &self.result_list,
            self.current_frame,
            done,
        )))
    }
}
