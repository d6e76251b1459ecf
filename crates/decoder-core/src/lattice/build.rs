use std::collections::{HashMap, HashSet};

use tracing::{debug, debug_span};

use super::{Lattice, LatticeError, NodeId};
use crate::logmath::LogMath;
use crate::search::{AlternateHypothesisManager, SearchResult, TokenArena, TokenId, Word};

enum Work {
    /// Connect everything leading into a word token to `node`.
    Word { token: TokenId, node: NodeId },
    /// Walk back from `token` until a word token, summing scores for the
    /// edge into `parent`.
    Path {
        parent: NodeId,
        token: TokenId,
        acoustic: f32,
        language: f32,
    },
}

struct Collapser<'a> {
    lattice: Lattice,
    arena: &'a TokenArena,
    alternates: Option<&'a AlternateHypothesisManager>,
    nodes: HashMap<TokenId, NodeId>,
    visited: HashSet<TokenId>,
    work: Vec<Work>,
    initial: Option<NodeId>,
    synthetic_start: Option<NodeId>,
}

impl<'a> Collapser<'a> {
    fn node_for(&mut self, token: TokenId) -> NodeId {
        if let Some(&node) = self.nodes.get(&token) {
            return node;
        }
        let arena = self.arena;
        let t = &arena[token];
        let word = t.word().cloned().unwrap_or_else(Word::silence);
        let begin = t
            .predecessor()
            .and_then(|p| arena.word_ancestor(p))
            .map_or(0, |w| arena[w].frame());
        let node = self.lattice.add_node(word, begin, t.frame());
        self.nodes.insert(token, node);
        node
    }

    fn start_node(&mut self) -> NodeId {
        match self.synthetic_start {
            Some(node) => node,
            None => {
                let node = self.lattice.add_node(Word::sentence_start(), 0, 0);
                self.synthetic_start = Some(node);
                node
            }
        }
    }

    fn losers(&self, token: TokenId) -> Vec<TokenId> {
        self.alternates
            .map(|a| a.alternate_predecessors(token).to_vec())
            .unwrap_or_default()
    }

    fn run(&mut self) -> Result<(), LatticeError> {
        while let Some(item) = self.work.pop() {
            match item {
                Work::Word { token, node } => self.collapse_word_token(token, node),
                Work::Path {
                    parent,
                    token,
                    acoustic,
                    language,
                } => self.collapse_path(parent, token, acoustic, language)?,
            }
        }
        Ok(())
    }

    fn collapse_word_token(&mut self, token: TokenId, node: NodeId) {
        if !self.visited.insert(token) {
            return;
        }
        let arena = self.arena;
        let t = &arena[token];
        let acoustic = t.acoustic_score() + t.insertion_score();
        let language = t.language_score();
        match t.predecessor() {
            Some(pred) => self.work.push(Work::Path {
                parent: node,
                token: pred,
                acoustic,
                language,
            }),
            None => self.initial = Some(node),
        }
        for loser in self.losers(token) {
            self.work.push(Work::Path {
                parent: node,
                token: loser,
                acoustic,
                language,
            });
        }
    }

    fn collapse_path(
        &mut self,
        parent: NodeId,
        token: TokenId,
        mut acoustic: f32,
        mut language: f32,
    ) -> Result<(), LatticeError> {
        let arena = self.arena;
        let t = &arena[token];
        if t.is_word() {
            let from = self.node_for(token);
            self.lattice.add_edge(from, parent, acoustic, language)?;
            self.work.push(Work::Word { token, node: from });
            return Ok(());
        }
        acoustic += t.acoustic_score() + t.insertion_score();
        language += t.language_score();
        match t.predecessor() {
            Some(pred) => self.work.push(Work::Path {
                parent,
                token: pred,
                acoustic,
                language,
            }),
            None => {
                let start = self.start_node();
                self.lattice.add_edge(start, parent, acoustic, language)?;
            }
        }
        for loser in self.losers(token) {
            self.work.push(Work::Path {
                parent,
                token: loser,
                acoustic,
                language,
            });
        }
        Ok(())
    }
}

impl Lattice {
    /// Collapse the token chains of a search result into a word lattice.
    ///
    /// Final tokens are used when present, otherwise the active ones. Each
    /// word token becomes a node; the tokens between two words become one
    /// edge carrying their summed scores. Alternate predecessors recorded
    /// during the search add the competing edges. A `<s>` or `</s>` node is
    /// synthesized when the chains do not provide one.
    pub fn from_result(result: &SearchResult<'_>, log_math: LogMath) -> Result<Self, LatticeError> {
        let _span = debug_span!("build_lattice", frame = result.frame()).entered();
        let tokens = if result.result_tokens().is_empty() {
            result.active_tokens()
        } else {
            result.result_tokens()
        };
        let best = result
            .best_token()
            .ok_or(LatticeError::Empty("result has no final or active tokens"))?;
        let arena = result.arena();

        let mut c = Collapser {
            lattice: Lattice::new(log_math),
            arena,
            alternates: result.alternates(),
            nodes: HashMap::new(),
            visited: HashSet::new(),
            work: Vec::new(),
            initial: None,
            synthetic_start: None,
        };

        let ends_sentence = |t: TokenId| arena[t].word().is_some_and(Word::is_sentence_end);
        let terminal = if ends_sentence(best) {
            c.node_for(best)
        } else {
            c.lattice
                .add_node(Word::sentence_end(), result.frame(), result.frame())
        };
        c.lattice.set_terminal_node(terminal);

        for &token in tokens {
            if ends_sentence(token) {
                c.nodes.insert(token, terminal);
                c.work.push(Work::Word { token, node: terminal });
            } else {
                c.work.push(Work::Path {
                    parent: terminal,
                    token,
                    acoustic: 0.0,
                    language: 0.0,
                });
            }
        }
        c.run()?;

        let initial = c
            .initial
            .or(c.synthetic_start)
            .ok_or(LatticeError::MissingInitialNode)?;
        let mut lattice = c.lattice;
        lattice.set_initial_node(initial);
        debug!(
            nodes = lattice.num_nodes(),
            edges = lattice.num_edges(),
            "lattice built"
        );
        Ok(lattice)
    }
}
