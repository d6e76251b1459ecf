use std::fs;

use decoder_engine::graph;
use decoder_engine::scorer::TableScorer;
use decoder_engine::settings::{self, Settings};
use decoder_engine::Recognizer;

pub struct DecodeArgs<'a> {
    pub graph_file: &'a str,
    pub scores_file: &'a str,
    pub settings_file: Option<&'a str>,
    pub nbest: usize,
    pub lattice_out: Option<&'a str>,
    pub no_optimize: bool,
    pub json: bool,
}

fn load_settings(file: Option<&str>) -> Settings {
    match file {
        Some(file) => {
            let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
            die!(settings::parse_settings_toml(&content), "Error in {file}: {}")
        }
        None => settings::settings().clone(),
    }
}

pub fn decode(args: &DecodeArgs) {
    let settings = load_settings(args.settings_file);
    let graph = die!(
        graph::from_file(args.graph_file),
        "Error loading graph {}: {}",
        args.graph_file
    );
    let scorer = die!(
        TableScorer::from_file(args.scores_file),
        "Error loading scores {}: {}",
        args.scores_file
    );
    let mut recognizer = die!(
        Recognizer::new(Box::new(graph), Box::new(scorer), &settings),
        "Error building recognizer: {}"
    )
    .nbest(args.nbest);
    if args.no_optimize {
        recognizer = recognizer.without_optimization();
    }

    let transcript = die!(recognizer.decode(), "Error decoding: {}");

    if let Some(out) = args.lattice_out {
        die!(
            transcript.lattice.dump_to_file(out),
            "Error writing lattice {out}: {}"
        );
        eprintln!(
            "lattice: {} nodes, {} edges -> {out}",
            transcript.lattice.num_nodes(),
            transcript.lattice.num_edges()
        );
    }

    if args.json {
        println!("{}", die!(transcript.to_json(), "Error: {}"));
        return;
    }

    println!("{}", transcript.hypothesis);
    for w in &transcript.words {
        println!(
            "  {:<16} {:>5}-{:<5} conf={:.3}",
            w.word, w.begin_time, w.end_time, w.confidence
        );
    }
    for (i, entry) in transcript.nbest.iter().enumerate() {
        println!("{:>3}  {:>12.3}  {}", i + 1, entry.score, entry.sentence);
    }
    let stats = &transcript.stats;
    eprintln!(
        "{} frames, {} tokens created, {} pruned",
        transcript.frames, stats.tokens_created, stats.tokens_pruned
    );
}
