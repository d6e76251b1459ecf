//! TOML graph descriptions.
//!
//! Either a `[word_loop]` table or explicit `[[state]]` and `[[arc]]` lists:
//!
//! ```toml
//! initial = "start"
//!
//! [[state]]
//! name = "start"
//! order = 0
//! word = "<s>"
//!
//! [[state]]
//! name = "a"
//! order = 1
//! unit = 7
//!
//! [[arc]]
//! from = "start"
//! to = "a"
//! language = -0.5
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::{GraphBuilder, GraphError, StaticGraph, WordLoop};
use crate::search::{UnitId, Word};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GraphFile {
    initial: Option<String>,
    num_state_order: Option<usize>,
    #[serde(default, rename = "state")]
    states: Vec<StateEntry>,
    #[serde(default, rename = "arc")]
    arcs: Vec<ArcEntry>,
    word_loop: Option<WordLoopEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateEntry {
    name: String,
    order: usize,
    unit: Option<UnitId>,
    word: Option<String>,
    filler: Option<bool>,
    #[serde(default, rename = "final")]
    is_final: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArcEntry {
    from: String,
    to: String,
    #[serde(default)]
    language: f32,
    #[serde(default)]
    insertion: f32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WordLoopEntry {
    #[serde(default)]
    language_score: f32,
    #[serde(default)]
    self_loop: f32,
    #[serde(default)]
    advance: f32,
    #[serde(default)]
    word_insertion: f32,
    words: Vec<PronunciationEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PronunciationEntry {
    spelling: String,
    units: Vec<UnitId>,
}

pub fn from_file(path: impl AsRef<Path>) -> Result<StaticGraph, GraphError> {
    from_toml(&std::fs::read_to_string(path)?)
}

pub fn from_toml(toml_str: &str) -> Result<StaticGraph, GraphError> {
    let file: GraphFile = toml::from_str(toml_str).map_err(|e| GraphError::Parse(e.to_string()))?;
    if let Some(word_loop) = file.word_loop {
        return word_loop
            .words
            .iter()
            .fold(WordLoop::new(), |wl, p| wl.word(&p.spelling, &p.units))
            .language_score(word_loop.language_score)
            .self_loop(word_loop.self_loop)
            .advance(word_loop.advance)
            .word_insertion(word_loop.word_insertion)
            .build();
    }

    let mut b = GraphBuilder::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for s in &file.states {
        if index.contains_key(&s.name) {
            return Err(GraphError::DuplicateState(s.name.clone()));
        }
        let id = match (&s.word, s.unit) {
            (Some(spelling), _) => {
                let word = match s.filler {
                    Some(filler) => Word::new(spelling.as_str(), filler),
                    None => Word::from_spelling(spelling),
                };
                if s.is_final {
                    b.final_word(&s.name, word, s.order)
                } else {
                    b.word(&s.name, word, s.order)
                }
            }
            (None, Some(unit)) => b.emitting(&s.name, unit, s.order),
            (None, None) => b.non_emitting(&s.name, s.order),
        };
        index.insert(s.name.clone(), id);
    }
    let lookup = |name: &str| {
        index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownState(name.to_string()))
    };
    for arc in &file.arcs {
        b.arc(lookup(&arc.from)?, lookup(&arc.to)?, arc.language, arc.insertion);
    }
    let initial = file.initial.as_deref().ok_or(GraphError::NoInitialState)?;
    b.initial(lookup(initial)?);
    if let Some(n) = file.num_state_order {
        b.num_state_order(n);
    }
    b.build()
}
