//! Table-driven acoustic scoring.
//!
//! Each frame maps acoustic units to log scores. Units missing from a frame
//! score `floor`. After the last frame the scorer reports the end of the
//! utterance once, then the end of the stream.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::logmath::LOG_ZERO;
use crate::search::{AcousticScorer, ScoreOutcome, TokenArena, TokenId, UnitId};

#[derive(Debug, thiserror::Error)]
pub enum ScoreTableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("frame {frame}: unit key {key:?} is not a number")]
    BadUnit { frame: usize, key: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableFile {
    floor: Option<f32>,
    #[serde(rename = "frame")]
    frames: Vec<HashMap<String, f32>>,
}

#[derive(Debug, Clone)]
pub struct TableScorer {
    frames: Vec<HashMap<UnitId, f32>>,
    floor: f32,
    position: usize,
    ended: bool,
}

impl TableScorer {
    pub fn new(frames: Vec<HashMap<UnitId, f32>>) -> Self {
        Self {
            frames,
            floor: LOG_ZERO,
            position: 0,
            ended: false,
        }
    }

    pub fn with_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }

    /// Parse a table of the form
    ///
    /// ```toml
    /// floor = -20.0
    ///
    /// [[frame]]
    /// 1 = -1.0
    /// 2 = -4.5
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, ScoreTableError> {
        let file: TableFile =
            toml::from_str(toml_str).map_err(|e| ScoreTableError::Parse(e.to_string()))?;
        let frames = file
            .frames
            .into_iter()
            .enumerate()
            .map(|(frame, raw)| {
                raw.into_iter()
                    .map(|(key, score)| {
                        key.parse::<UnitId>()
                            .map(|unit| (unit, score))
                            .map_err(|_| ScoreTableError::BadUnit { frame, key })
                    })
                    .collect::<Result<HashMap<_, _>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let scorer = Self::new(frames);
        Ok(match file.floor {
            Some(floor) => scorer.with_floor(floor),
            None => scorer,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScoreTableError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    fn score(&self, frame: usize, unit: Option<UnitId>) -> f32 {
        unit.and_then(|u| self.frames[frame].get(&u).copied())
            .unwrap_or(self.floor)
    }
}

impl AcousticScorer for TableScorer {
    fn start_recognition(&mut self) {
        self.position = 0;
        self.ended = false;
    }

    fn calculate_scores(&mut self, arena: &mut TokenArena, tokens: &[TokenId]) -> ScoreOutcome {
        if self.position >= self.frames.len() {
            if self.ended {
                return ScoreOutcome::StreamEnd;
            }
            self.ended = true;
            debug!(frames = self.frames.len(), "score table exhausted");
            return ScoreOutcome::UtteranceEnd;
        }
        let frame = self.position;
        self.position += 1;
        let mut best: Option<TokenId> = None;
        for &id in tokens {
            let acoustic = self.score(frame, arena[id].state().unit());
            arena.get_mut(id).apply_acoustic_score(acoustic, frame);
            if best.map_or(true, |b| arena.score(id) > arena.score(b)) {
                best = Some(id);
            }
        }
        match best {
            Some(id) => ScoreOutcome::Best(id),
            None => ScoreOutcome::UtteranceEnd,
        }
    }
}
