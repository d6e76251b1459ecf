//! HTK Standard Lattice Format.
//!
//! Nodes carry `I=` (index), `t=` (time in seconds) and `W=` (word); links
//! carry `J=`, `S=`, `E=`, `a=` (acoustic) and `l=` (language score divided
//! by `lmscale`). The start node is written as index 0 and the end node as
//! index 1. Marker words are written as `!NULL`.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use super::{Lattice, LatticeError, NodeId};
use crate::logmath::LogMath;
use crate::search::Word;

const NULL_WORD: &str = "!NULL";

#[derive(Debug, Clone)]
pub struct SlfOptions {
    pub utterance: String,
    pub lmscale: f32,
    /// Seconds per frame.
    pub frame_shift: f64,
}

impl Default for SlfOptions {
    fn default() -> Self {
        Self {
            utterance: "utterance".to_string(),
            lmscale: 9.5,
            frame_shift: 0.01,
        }
    }
}

impl Lattice {
    pub fn write_slf(&self, w: &mut impl Write, options: &SlfOptions) -> Result<(), LatticeError> {
        let initial = self.require_initial()?;
        let terminal = self.require_terminal()?;

        let mut order: Vec<NodeId> = vec![initial, terminal];
        order.extend(self.nodes.keys().filter(|&&n| n != initial && n != terminal));
        let index: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        writeln!(w, "VERSION=1.1")?;
        writeln!(w, "UTTERANCE={}", options.utterance)?;
        writeln!(w, "base={}", self.log_math.log_base())?;
        writeln!(w, "lmscale={}", options.lmscale)?;
        writeln!(w, "start=0")?;
        writeln!(w, "end=1")?;
        writeln!(w, "#\n# Size line.\n#")?;
        writeln!(w, "NODES={}    LINKS={}", self.num_nodes(), self.num_edges())?;
        writeln!(w, "#\n# Node definitions.\n#")?;
        for (i, id) in order.iter().enumerate() {
            let Some(node) = self.node(*id) else {
                continue;
            };
            let spelling = node.word.spelling();
            let spelling = if spelling.starts_with('<') { NULL_WORD } else { spelling };
            writeln!(
                w,
                "I={i}    t={}    W={spelling}",
                node.begin_time as f64 * options.frame_shift
            )?;
        }
        writeln!(w, "#\n# Link definitions.\n#")?;
        for (j, edge) in self.edges().enumerate() {
            writeln!(
                w,
                "J={j}    S={}    E={}    a={}    l={}",
                index[&edge.from],
                index[&edge.to],
                edge.acoustic_score,
                edge.lm_score / options.lmscale
            )?;
        }
        w.flush()?;
        Ok(())
    }

    /// Read an SLF lattice. Frame times come from `t=` divided by
    /// `frame_shift`; a node ends where its earliest successor begins.
    pub fn read_slf(r: impl BufRead, frame_shift: f64) -> Result<Self, LatticeError> {
        enum Section {
            Header,
            Nodes,
            Links,
        }

        let mut section = Section::Header;
        let mut start_index = 0usize;
        let mut end_index = 1usize;
        let mut lmscale = SlfOptions::default().lmscale;
        let mut lattice = Lattice::new(LogMath::default());
        let mut ids: HashMap<usize, NodeId> = HashMap::new();

        for (n, line) in r.lines().enumerate() {
            let line = line?;
            let line_no = n + 1;
            let parse_err = |message: String| LatticeError::Parse {
                line: line_no,
                message,
            };
            if line.contains("Node definitions") {
                section = Section::Nodes;
                continue;
            }
            if line.contains("Link definitions") {
                section = Section::Links;
                continue;
            }
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields = key_values(line);
            match section {
                Section::Header => {
                    for (key, value) in &fields {
                        match *key {
                            "start" => start_index = parse(value, "start").map_err(parse_err)?,
                            "end" => end_index = parse(value, "end").map_err(parse_err)?,
                            "lmscale" => lmscale = parse(value, "lmscale").map_err(parse_err)?,
                            "base" => {
                                let base: f64 = parse(value, "base").map_err(parse_err)?;
                                if base <= 1.0 {
                                    return Err(parse_err(format!(
                                        "log base must exceed 1, got {base}"
                                    )));
                                }
                                lattice.log_math = LogMath::new(base);
                            }
                            _ => {}
                        }
                    }
                }
                Section::Nodes => {
                    let get = |key: &str| field(&fields, key).map_err(parse_err);
                    let index: usize = parse(get("I")?, "node index").map_err(parse_err)?;
                    let seconds: f64 = parse(get("t")?, "time").map_err(parse_err)?;
                    let raw = get("W")?;
                    let word = if index == start_index || raw == "!ENTER" {
                        Word::sentence_start()
                    } else if index == end_index || raw == "!EXIT" {
                        Word::sentence_end()
                    } else if raw == NULL_WORD {
                        Word::silence()
                    } else {
                        Word::from_spelling(raw)
                    };
                    let begin = (seconds / frame_shift).round().max(0.0) as usize;
                    let is_start = word.is_sentence_start();
                    let is_end = word.is_sentence_end();
                    let id = lattice.add_node(word, begin, begin);
                    if ids.insert(index, id).is_some() {
                        return Err(parse_err(format!("duplicate node I={index}")));
                    }
                    if is_start {
                        lattice.set_initial_node(id);
                    }
                    if is_end {
                        lattice.set_terminal_node(id);
                    }
                }
                Section::Links => {
                    let get = |key: &str| field(&fields, key).map_err(parse_err);
                    get("J")?;
                    let node = |key: &str| -> Result<NodeId, LatticeError> {
                        let index: usize = parse(get(key)?, "node index").map_err(parse_err)?;
                        ids.get(&index).copied().ok_or_else(|| {
                            parse_err(format!("link refers to unknown node {index}"))
                        })
                    };
                    let from = node("S")?;
                    let to = node("E")?;
                    let acoustic: f32 = parse(get("a")?, "acoustic score").map_err(parse_err)?;
                    let lm: f32 = parse(get("l")?, "language score").map_err(parse_err)?;
                    lattice.add_edge(from, to, acoustic, lm * lmscale)?;
                }
            }
        }

        let ends: Vec<(NodeId, usize)> = lattice
            .nodes()
            .map(|n| {
                let begin = n.begin_time;
                let end = lattice
                    .successors(n.id)
                    .iter()
                    .filter_map(|s| lattice.node(*s))
                    .map(|s| s.begin_time.max(begin))
                    .min()
                    .unwrap_or(begin);
                (n.id, end)
            })
            .collect();
        for (id, end) in ends {
            if let Some(node) = lattice.node_mut(id) {
                node.end_time = end;
            }
        }
        lattice.require_initial()?;
        lattice.require_terminal()?;
        Ok(lattice)
    }
}

fn key_values(line: &str) -> Vec<(&str, &str)> {
    line.split_whitespace()
        .filter_map(|part| part.split_once('='))
        .collect()
}

fn field<'a>(fields: &[(&str, &'a str)], key: &str) -> Result<&'a str, String> {
    fields
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .ok_or_else(|| format!("missing field {key}="))
}

fn parse<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("bad {what} {raw:?}"))
}
