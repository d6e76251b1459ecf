//! In-memory search graphs.
//!
//! `StaticGraph` is an immutable state/arc table shared behind an `Arc`;
//! the states it hands to the search are lightweight `(graph, index)`
//! handles. Graphs are built with `GraphBuilder`, with the `WordLoop` and
//! `PhoneLoop` shortcuts, or from TOML (`from_toml`).

mod builders;
mod toml_io;

use std::fmt;
use std::sync::Arc;

use crate::search::{
    Linguist, SearchState, SearchStateArc, StateKey, StateRef, UnitId, Word,
};

pub use builders::{PhoneLoop, WordLoop};
pub use toml_io::{from_file, from_toml};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("unknown state: {0}")]
    UnknownState(String),
    #[error("duplicate state name: {0}")]
    DuplicateState(String),
    #[error("no initial state")]
    NoInitialState,
    #[error("arc {from} -> {to} references a missing state")]
    ArcOutOfRange { from: usize, to: usize },
    #[error("state {state} has order {order}: {reason}")]
    BadOrder {
        state: String,
        order: usize,
        reason: &'static str,
    },
    #[error("empty graph: {0}")]
    Empty(&'static str),
}

#[derive(Debug, Clone)]
struct ArcData {
    to: usize,
    language: f32,
    insertion: f32,
}

#[derive(Debug, Clone)]
struct StateData {
    name: String,
    order: usize,
    unit: Option<UnitId>,
    word: Option<Word>,
    is_final: bool,
    arcs: Vec<ArcData>,
}

#[derive(Debug)]
struct GraphData {
    states: Vec<StateData>,
    initial: usize,
    num_state_order: usize,
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    states: Vec<StateData>,
    arcs: Vec<(usize, ArcData)>,
    initial: Option<usize>,
    num_state_order: Option<usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, state: StateData) -> usize {
        self.states.push(state);
        self.states.len() - 1
    }

    fn state(name: &str, order: usize) -> StateData {
        StateData {
            name: name.to_string(),
            order,
            unit: None,
            word: None,
            is_final: false,
            arcs: Vec::new(),
        }
    }

    pub fn emitting(&mut self, name: &str, unit: UnitId, order: usize) -> usize {
        self.push(StateData {
            unit: Some(unit),
            ..Self::state(name, order)
        })
    }

    pub fn non_emitting(&mut self, name: &str, order: usize) -> usize {
        self.push(Self::state(name, order))
    }

    /// A word-boundary state.
    pub fn word(&mut self, name: &str, word: Word, order: usize) -> usize {
        self.push(StateData {
            word: Some(word),
            ..Self::state(name, order)
        })
    }

    /// A word-boundary state that ends the utterance.
    pub fn final_word(&mut self, name: &str, word: Word, order: usize) -> usize {
        self.push(StateData {
            word: Some(word),
            is_final: true,
            ..Self::state(name, order)
        })
    }

    pub fn arc(&mut self, from: usize, to: usize, language: f32, insertion: f32) -> &mut Self {
        self.arcs.push((
            from,
            ArcData {
                to,
                language,
                insertion,
            },
        ));
        self
    }

    pub fn initial(&mut self, index: usize) -> &mut Self {
        self.initial = Some(index);
        self
    }

    /// Defaults to one more than the highest state order.
    pub fn num_state_order(&mut self, n: usize) -> &mut Self {
        self.num_state_order = Some(n);
        self
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == name)
    }

    pub fn build(self) -> Result<StaticGraph, GraphError> {
        let GraphBuilder {
            mut states,
            arcs,
            initial,
            num_state_order,
        } = self;
        if states.is_empty() {
            return Err(GraphError::Empty("no states"));
        }
        let initial = initial
            .filter(|&i| i < states.len())
            .ok_or(GraphError::NoInitialState)?;
        let max_order = states.iter().map(|s| s.order).max().unwrap_or(0);
        let num_state_order = num_state_order.unwrap_or(max_order + 1);
        let emitting_order = num_state_order.saturating_sub(1);
        for s in &states {
            if s.order >= num_state_order {
                return Err(GraphError::BadOrder {
                    state: s.name.clone(),
                    order: s.order,
                    reason: "exceeds the number of state orders",
                });
            }
            if s.unit.is_some() && s.order != emitting_order {
                return Err(GraphError::BadOrder {
                    state: s.name.clone(),
                    order: s.order,
                    reason: "emitting states belong to the last order",
                });
            }
            if s.unit.is_none() && s.order == emitting_order && num_state_order > 1 {
                return Err(GraphError::BadOrder {
                    state: s.name.clone(),
                    order: s.order,
                    reason: "the last order is reserved for emitting states",
                });
            }
        }
        for (from, arc) in arcs {
            if from >= states.len() || arc.to >= states.len() {
                return Err(GraphError::ArcOutOfRange { from, to: arc.to });
            }
            states[from].arcs.push(arc);
        }
        Ok(StaticGraph {
            data: Arc::new(GraphData {
                states,
                initial,
                num_state_order,
            }),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StaticGraph {
    data: Arc<GraphData>,
}

impl StaticGraph {
    pub fn len(&self) -> usize {
        self.data.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.states.is_empty()
    }

    pub fn state(&self, index: usize) -> Option<StateRef> {
        (index < self.len()).then(|| StaticState::handle(&self.data, index))
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.data.states.iter().position(|s| s.name == name)
    }

    /// Distinct acoustic units, ascending.
    pub fn units(&self) -> Vec<UnitId> {
        let mut units: Vec<UnitId> = self.data.states.iter().filter_map(|s| s.unit).collect();
        units.sort_unstable();
        units.dedup();
        units
    }

    pub fn num_arcs(&self) -> usize {
        self.data.states.iter().map(|s| s.arcs.len()).sum()
    }
}

impl Linguist for StaticGraph {
    fn initial_state(&self) -> StateRef {
        StaticState::handle(&self.data, self.data.initial)
    }

    fn num_state_order(&self) -> usize {
        self.data.num_state_order
    }
}

/// A state of a `StaticGraph`.
pub struct StaticState {
    graph: Arc<GraphData>,
    index: usize,
}

impl StaticState {
    fn handle(graph: &Arc<GraphData>, index: usize) -> StateRef {
        Arc::new(StaticState {
            graph: Arc::clone(graph),
            index,
        })
    }

    fn data(&self) -> &StateData {
        &self.graph.states[self.index]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }
}

impl fmt::Debug for StaticState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        f.debug_struct("StaticState")
            .field("index", &self.index)
            .field("name", &data.name)
            .field("order", &data.order)
            .finish()
    }
}

impl SearchState for StaticState {
    fn key(&self) -> StateKey {
        StateKey(self.index as u64)
    }

    fn order(&self) -> usize {
        self.data().order
    }

    fn is_emitting(&self) -> bool {
        self.data().unit.is_some()
    }

    fn is_final(&self) -> bool {
        self.data().is_final
    }

    fn word(&self) -> Option<&Word> {
        self.data().word.as_ref()
    }

    fn unit(&self) -> Option<UnitId> {
        self.data().unit
    }

    fn successors(&self) -> Vec<SearchStateArc> {
        self.data()
            .arcs
            .iter()
            .map(|arc| {
                SearchStateArc::new(
                    StaticState::handle(&self.graph, arc.to),
                    arc.language,
                    arc.insertion,
                )
            })
            .collect()
    }
}
