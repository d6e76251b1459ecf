use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;
use decoder_engine::lattice::{Lattice, LatticeError, Nbest, SlfOptions};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Native text dump (`node:`/`edge:` lines)
    Lat,
    /// HTK Standard Lattice Format
    Slf,
    /// Graphviz
    Dot,
    /// aiSee GDL
    Aisee,
}

impl Format {
    pub fn from_path(path: &str) -> Option<Self> {
        match Path::new(path).extension()?.to_str()? {
            "lat" => Some(Format::Lat),
            "slf" | "htk" => Some(Format::Slf),
            "dot" | "gv" => Some(Format::Dot),
            "gdl" | "aisee" => Some(Format::Aisee),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("cannot tell the lattice format of {0} from its extension")]
    Unknown(String),
    #[error("{0:?} is an output-only format")]
    OutputOnly(Format),
    #[error(transparent)]
    Lattice(#[from] LatticeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn resolve(path: &str, format: Option<Format>) -> Result<Format, FormatError> {
    format
        .or_else(|| Format::from_path(path))
        .ok_or_else(|| FormatError::Unknown(path.to_string()))
}

pub fn load(path: &str, format: Option<Format>, frame_shift: f64) -> Result<Lattice, FormatError> {
    match resolve(path, format)? {
        Format::Lat => Ok(Lattice::read_file(path)?),
        Format::Slf => {
            let reader = BufReader::new(File::open(path)?);
            Ok(Lattice::read_slf(reader, frame_shift)?)
        }
        other => Err(FormatError::OutputOnly(other)),
    }
}

pub fn save(
    lattice: &Lattice,
    path: &str,
    format: Option<Format>,
    options: &SlfOptions,
) -> Result<(), FormatError> {
    let format = resolve(path, format)?;
    let mut w = BufWriter::new(File::create(path)?);
    let title = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("lattice");
    match format {
        Format::Lat => lattice.dump(&mut w)?,
        Format::Slf => lattice.write_slf(&mut w, options)?,
        Format::Dot => lattice.dump_dot(&mut w, title)?,
        Format::Aisee => lattice.dump_aisee(&mut w, title)?,
    }
    w.flush()?;
    Ok(())
}

fn slf_options(path: &str, frame_shift: f64) -> SlfOptions {
    SlfOptions {
        utterance: Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string(),
        frame_shift,
        ..SlfOptions::default()
    }
}

pub fn convert(
    input: &str,
    output: &str,
    from: Option<Format>,
    to: Option<Format>,
    frame_shift: f64,
) {
    let lattice = die!(load(input, from, frame_shift), "Error reading {input}: {}");
    die!(
        save(&lattice, output, to, &slf_options(input, frame_shift)),
        "Error writing {output}: {}"
    );
    eprintln!(
        "{input} -> {output}: {} nodes, {} edges",
        lattice.num_nodes(),
        lattice.num_edges()
    );
}

pub fn optimize(input: &str, output: &str, remove_fillers: bool, frame_shift: f64) {
    let mut lattice = die!(load(input, None, frame_shift), "Error reading {input}: {}");
    let (nodes, edges) = (lattice.num_nodes(), lattice.num_edges());
    if remove_fillers {
        let removed = die!(lattice.remove_fillers(), "Error removing fillers: {}");
        eprintln!("  removed {removed} filler nodes");
    }
    let stats = die!(lattice.optimize(), "Error optimizing: {}");
    eprintln!("  parallel edges merged: {}", stats.parallel_edges_merged);
    eprintln!("  forward merges:        {}", stats.forward_merges);
    eprintln!("  backward merges:       {}", stats.backward_merges);
    eprintln!("  hanging nodes removed: {}", stats.hanging_nodes_removed);
    eprintln!(
        "{nodes} -> {} nodes, {edges} -> {} edges",
        lattice.num_nodes(),
        lattice.num_edges()
    );
    die!(
        save(&lattice, output, None, &slf_options(input, frame_shift)),
        "Error writing {output}: {}"
    );
}

#[derive(Serialize)]
struct NbestRow<'a> {
    rank: usize,
    score: f32,
    sentence: &'a str,
}

pub fn nbest(
    input: &str,
    n: usize,
    language_weight: f32,
    max_frontier: usize,
    json: bool,
    frame_shift: f64,
) {
    let mut lattice = die!(load(input, None, frame_shift), "Error reading {input}: {}");
    let paths = die!(
        Nbest::new(&mut lattice)
            .language_weight(language_weight)
            .max_frontier(max_frontier)
            .get_nbest(n),
        "Error searching N-best: {}"
    );
    let rows: Vec<NbestRow> = paths
        .iter()
        .enumerate()
        .map(|(i, p)| NbestRow {
            rank: i + 1,
            score: p.score,
            sentence: &p.sentence,
        })
        .collect();
    if json {
        println!("{}", die!(serde_json::to_string_pretty(&rows), "Error: {}"));
        return;
    }
    for row in &rows {
        println!("{:>3}  {:>12.3}  {}", row.rank, row.score, row.sentence);
    }
}

pub fn posteriors(
    input: &str,
    language_weight: f32,
    acoustic_only: bool,
    json: bool,
    frame_shift: f64,
) {
    let mut lattice = die!(load(input, None, frame_shift), "Error reading {input}: {}");
    die!(
        lattice.compute_node_posteriors_with(language_weight, acoustic_only),
        "Error computing posteriors: {}"
    );
    if json {
        let words = lattice.word_results();
        println!("{}", die!(serde_json::to_string_pretty(&words), "Error: {}"));
        return;
    }
    println!(
        "{:>5}  {:<16}  {:>6}  {:>6}  {:>12}  {:>8}",
        "node", "word", "begin", "end", "posterior", "conf"
    );
    let log_math = lattice.log_math();
    for node in lattice.nodes() {
        println!(
            "{:>5}  {:<16}  {:>6}  {:>6}  {:>12.3}  {:>8.4}",
            node.id(),
            node.word().spelling(),
            node.begin_time(),
            node.end_time(),
            node.posterior(),
            log_math.log_to_linear(node.posterior()),
        );
    }
}
