//! End-to-end decoding: search, lattice, posteriors and N-best in one call.

use serde::Serialize;
use tracing::{debug, debug_span, warn};

use decoder_core::lattice::{Lattice, LatticeError, Nbest, WordResult};
use decoder_core::logmath::LogMath;
use decoder_core::search::{
    AcousticScorer, ActiveListFactory, FastMatch, Linguist, SearchConfig, SearchError,
    SearchManager, SearchStats, SimplePruner, WordPruningSearchManager,
};
use decoder_core::settings::Settings;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Lattice(#[from] LatticeError),
    #[error("the input ended before the utterance was complete")]
    NoResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct NbestEntry {
    pub sentence: String,
    pub score: f32,
}

/// Everything one decoded utterance produced.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub hypothesis: String,
    pub frames: usize,
    pub words: Vec<WordResult>,
    pub nbest: Vec<NbestEntry>,
    #[serde(skip)]
    pub lattice: Lattice,
    #[serde(skip)]
    pub stats: SearchStats,
}

impl Transcript {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct Recognizer {
    search: WordPruningSearchManager,
    log_math: LogMath,
    language_weight: f32,
    max_frontier: usize,
    nbest: usize,
    optimize: bool,
}

impl Recognizer {
    /// Build a recognizer configured from `settings`. Allocates the search.
    pub fn new(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        settings: &Settings,
    ) -> Result<Self, EngineError> {
        Self::build(linguist, scorer, settings, None)
    }

    /// Like `new`, with a fast-match search pruning unit entries.
    pub fn with_fast_match(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        fast_match: FastMatch,
        settings: &Settings,
    ) -> Result<Self, EngineError> {
        Self::build(linguist, scorer, settings, Some(fast_match))
    }

    fn build(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        settings: &Settings,
        fast_match: Option<FastMatch>,
    ) -> Result<Self, EngineError> {
        let log_math = LogMath::from_settings(settings);
        let mut search = WordPruningSearchManager::new(
            linguist,
            scorer,
            Box::new(SimplePruner),
            vec![ActiveListFactory::from_settings(settings, &log_math)],
            SearchConfig::from_settings(settings),
        );
        if let Some(fast_match) = fast_match {
            search = search.with_fast_match(fast_match);
        }
        search.allocate()?;
        Ok(Self {
            search,
            log_math,
            language_weight: settings.posterior.language_weight,
            max_frontier: settings.nbest.max_frontier,
            nbest: 1,
            optimize: true,
        })
    }

    /// Number of N-best sentences to extract (0 skips the N-best search).
    pub fn nbest(mut self, n: usize) -> Self {
        self.nbest = n;
        self
    }

    /// Skip lattice minimization.
    pub fn without_optimization(mut self) -> Self {
        self.optimize = false;
        self
    }

    pub fn search(&self) -> &WordPruningSearchManager {
        &self.search
    }

    /// Decode one utterance from start to end of input.
    pub fn decode(&mut self) -> Result<Transcript, EngineError> {
        let _span = debug_span!("decode").entered();
        self.search.start_recognition()?;
        let decoded = self.run();
        self.search.stop_recognition();
        let (hypothesis, frames, lattice) = decoded?;
        self.finish(hypothesis, frames, lattice)
    }

    fn run(&mut self) -> Result<(String, usize, Lattice), EngineError> {
        loop {
            let Some(result) = self.search.recognize(usize::MAX)? else {
                return Err(EngineError::NoResult);
            };
            if result.is_final() {
                if result.result_tokens().is_empty() {
                    warn!(frame = result.frame(), "no path reached a final state");
                }
                let lattice = Lattice::from_result(&result, self.log_math)?;
                return Ok((result.hypothesis(), result.frame(), lattice));
            }
        }
    }

    fn finish(
        &self,
        hypothesis: String,
        frames: usize,
        mut lattice: Lattice,
    ) -> Result<Transcript, EngineError> {
        if self.optimize {
            lattice.optimize()?;
        }
        let nbest = if self.nbest > 0 {
            Nbest::new(&mut lattice)
                .language_weight(self.language_weight)
                .max_frontier(self.max_frontier)
                .get_nbest(self.nbest)?
                .into_iter()
                .map(|p| NbestEntry {
                    sentence: p.sentence,
                    score: p.score,
                })
                .collect()
        } else {
            Vec::new()
        };
        lattice.compute_node_posteriors(self.language_weight)?;
        let words = lattice.word_results();
        debug!(
            frames,
            words = words.len(),
            nbest = nbest.len(),
            nodes = lattice.num_nodes(),
            "utterance decoded"
        );
        Ok(Transcript {
            hypothesis,
            frames,
            words,
            nbest,
            lattice,
            stats: self.search.stats(),
        })
    }
}
