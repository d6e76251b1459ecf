//! Token-passing speech decoder: beam search, word lattices, posteriors
//! and N-best extraction.
//!
//! The search core lives in `decoder_core` and is re-exported here; this
//! crate adds the end-to-end [`Recognizer`] and the optional trace log.

pub use decoder_core::{graph, lattice, logmath, scorer, search, settings};

mod recognizer;
mod trace_init;

pub use recognizer::{EngineError, NbestEntry, Recognizer, Transcript};
pub use trace_init::{init_tracing, TraceGuard, DEFAULT_TRACE_FILTER};
