//! The plain-text lattice dump format.
//!
//! ```text
//! # Header
//! logBase: 1.0001
//! numberOfNodes: 3
//! numberOfEdges: 2
//! node: 0 <s> 0 0
//! node: 1 cat 0 2
//! node: 2 </s> 2 4
//! initialNode: 0
//! terminalNode: 2
//! edge: 0 1 -12.5 -3
//! edge: 1 2 -8 -1
//! ```
//!
//! Lines starting with `#` are comments. Node ids in a file need not match
//! the ids assigned on reading.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::{Lattice, LatticeError, NodeId};
use crate::logmath::LogMath;
use crate::search::Word;

impl Lattice {
    pub fn dump(&self, w: &mut impl Write) -> std::io::Result<()> {
        writeln!(w, "# Header")?;
        writeln!(w, "logBase: {}", self.log_math.log_base())?;
        writeln!(w, "numberOfNodes: {}", self.num_nodes())?;
        writeln!(w, "numberOfEdges: {}", self.num_edges())?;
        writeln!(w, "# Nodes")?;
        for node in self.nodes() {
            writeln!(
                w,
                "node: {} {} {} {}",
                node.id,
                node.word.spelling(),
                node.begin_time,
                node.end_time
            )?;
        }
        if let Some(id) = self.initial {
            writeln!(w, "initialNode: {id}")?;
        }
        if let Some(id) = self.terminal {
            writeln!(w, "terminalNode: {id}")?;
        }
        writeln!(w, "# Edges")?;
        for edge in self.edges() {
            writeln!(
                w,
                "edge: {} {} {} {}",
                edge.from, edge.to, edge.acoustic_score, edge.lm_score
            )?;
        }
        writeln!(w, "# End")
    }

    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> Result<(), LatticeError> {
        let mut w = BufWriter::new(File::create(path)?);
        self.dump(&mut w)?;
        w.flush()?;
        Ok(())
    }

    pub fn read(r: impl BufRead) -> Result<Self, LatticeError> {
        let mut lattice = Lattice::new(LogMath::default());
        let mut ids: HashMap<String, NodeId> = HashMap::new();
        let mut initial = None;
        let mut terminal = None;

        for (n, line) in r.lines().enumerate() {
            let line = line?;
            let line_no = n + 1;
            let parse_err = |message: String| LatticeError::Parse {
                line: line_no,
                message,
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, rest) = line
                .split_once(':')
                .ok_or_else(|| parse_err(format!("expected `key: value`, got {line:?}")))?;
            let fields: Vec<&str> = rest.split_whitespace().collect();
            match key {
                "logBase" => {
                    let base = parse_field::<f64>(&fields, 0, "log base").map_err(parse_err)?;
                    if base <= 1.0 {
                        return Err(parse_err(format!("log base must exceed 1, got {base}")));
                    }
                    lattice.log_math = LogMath::new(base);
                }
                "numberOfNodes" | "numberOfEdges" => {}
                "node" => {
                    if fields.len() != 4 {
                        return Err(parse_err(format!("node needs 4 fields, got {}", fields.len())));
                    }
                    let begin = parse_field::<usize>(&fields, 2, "begin time").map_err(parse_err)?;
                    let end = parse_field::<usize>(&fields, 3, "end time").map_err(parse_err)?;
                    let id = lattice.add_node(Word::from_spelling(fields[1]), begin, end);
                    if ids.insert(fields[0].to_string(), id).is_some() {
                        return Err(parse_err(format!("duplicate node {}", fields[0])));
                    }
                }
                "initialNode" => initial = Some(lookup(&ids, &fields).map_err(parse_err)?),
                "terminalNode" => terminal = Some(lookup(&ids, &fields).map_err(parse_err)?),
                "edge" => {
                    if fields.len() != 4 {
                        return Err(parse_err(format!("edge needs 4 fields, got {}", fields.len())));
                    }
                    let from = lookup(&ids, &fields[0..1]).map_err(parse_err)?;
                    let to = lookup(&ids, &fields[1..2]).map_err(parse_err)?;
                    let acoustic =
                        parse_field::<f32>(&fields, 2, "acoustic score").map_err(parse_err)?;
                    let lm =
                        parse_field::<f32>(&fields, 3, "language score").map_err(parse_err)?;
                    lattice.add_edge(from, to, acoustic, lm)?;
                }
                other => return Err(parse_err(format!("unknown key {other:?}"))),
            }
        }

        lattice.set_initial_node(initial.ok_or(LatticeError::MissingInitialNode)?);
        lattice.set_terminal_node(terminal.ok_or(LatticeError::MissingTerminalNode)?);
        Ok(lattice)
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, LatticeError> {
        Self::read(BufReader::new(File::open(path)?))
    }
}

fn parse_field<T: std::str::FromStr>(fields: &[&str], i: usize, what: &str) -> Result<T, String> {
    let raw = fields.get(i).ok_or_else(|| format!("missing {what}"))?;
    raw.parse().map_err(|_| format!("bad {what} {raw:?}"))
}

fn lookup(ids: &HashMap<String, NodeId>, fields: &[&str]) -> Result<NodeId, String> {
    let name = fields.first().ok_or("missing node id")?;
    ids.get(*name).copied().ok_or_else(|| format!("unknown node {name}"))
}
