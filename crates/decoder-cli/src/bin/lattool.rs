use std::path::Path;

use clap::{Parser, Subcommand};

use decoder_cli::commands::decode_ops::{self, DecodeArgs};
use decoder_cli::commands::lattice_ops::{self, Format};
use decoder_cli::commands::config_ops;

#[derive(Parser)]
#[command(name = "lattool", about = "Word lattice and decoding tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a lattice between formats (chosen by extension unless given)
    Convert {
        /// Input format
        #[arg(long, value_enum)]
        from: Option<Format>,
        /// Output format
        #[arg(long, value_enum)]
        to: Option<Format>,
        /// Seconds per frame, for SLF times
        #[arg(long, default_value_t = 0.01)]
        frame_shift: f64,
        /// Input lattice (.lat or .slf)
        input: String,
        /// Output file (.lat, .slf, .dot or .gdl)
        output: String,
    },
    /// Minimize a lattice and report what was merged
    Optimize {
        /// Drop filler nodes before merging
        #[arg(long)]
        remove_fillers: bool,
        /// Seconds per frame, for SLF times
        #[arg(long, default_value_t = 0.01)]
        frame_shift: f64,
        /// Input lattice
        input: String,
        /// Output lattice
        output: String,
    },
    /// List the N best sentences of a lattice
    Nbest {
        /// Number of sentences
        #[arg(short, default_value_t = 10)]
        n: usize,
        /// Language model weight
        #[arg(long, default_value_t = 1.0)]
        language_weight: f32,
        /// Largest number of partial paths kept during the search
        #[arg(long, default_value_t = 10_000)]
        max_frontier: usize,
        /// Print JSON
        #[arg(long)]
        json: bool,
        /// Seconds per frame, for SLF times
        #[arg(long, default_value_t = 0.01)]
        frame_shift: f64,
        /// Input lattice
        input: String,
    },
    /// Print node posteriors
    Posteriors {
        /// Language model weight
        #[arg(long, default_value_t = 1.0)]
        language_weight: f32,
        /// Ignore language scores entirely
        #[arg(long)]
        acoustic_only: bool,
        /// Print word results as JSON
        #[arg(long)]
        json: bool,
        /// Seconds per frame, for SLF times
        #[arg(long, default_value_t = 0.01)]
        frame_shift: f64,
        /// Input lattice
        input: String,
    },
    /// Decode an utterance from a TOML graph and a TOML score table
    Decode {
        /// Settings TOML (defaults to the embedded settings)
        #[arg(long)]
        settings: Option<String>,
        /// Number of N-best sentences (0 to skip)
        #[arg(short, default_value_t = 5)]
        n: usize,
        /// Write the word lattice here (.lat)
        #[arg(long)]
        lattice: Option<String>,
        /// Keep the lattice unminimized
        #[arg(long)]
        no_optimize: bool,
        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
        /// Directory for JSON trace logs (needs the `trace` feature)
        #[arg(long)]
        trace_dir: Option<String>,
        /// Search graph TOML
        graph: String,
        /// Per-frame unit scores TOML
        scores: String,
    },
    /// Print the default settings TOML
    SettingsExport,
    /// Validate a settings TOML file
    SettingsValidate {
        /// Settings file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Convert {
            from,
            to,
            frame_shift,
            input,
            output,
        } => lattice_ops::convert(&input, &output, from, to, frame_shift),
        Command::Optimize {
            remove_fillers,
            frame_shift,
            input,
            output,
        } => lattice_ops::optimize(&input, &output, remove_fillers, frame_shift),
        Command::Nbest {
            n,
            language_weight,
            max_frontier,
            json,
            frame_shift,
            input,
        } => lattice_ops::nbest(&input, n, language_weight, max_frontier, json, frame_shift),
        Command::Posteriors {
            language_weight,
            acoustic_only,
            json,
            frame_shift,
            input,
        } => lattice_ops::posteriors(&input, language_weight, acoustic_only, json, frame_shift),
        Command::Decode {
            settings,
            n,
            lattice,
            no_optimize,
            json,
            trace_dir,
            graph,
            scores,
        } => {
            let _trace = trace_dir.as_deref().and_then(|dir| {
                decoder_engine::init_tracing(Path::new(dir), "decoder-trace.jsonl")
            });
            decode_ops::decode(&DecodeArgs {
                graph_file: &graph,
                scores_file: &scores,
                settings_file: settings.as_deref(),
                nbest: n,
                lattice_out: lattice.as_deref(),
                no_optimize,
                json,
            })
        }
        Command::SettingsExport => config_ops::settings_export(),
        Command::SettingsValidate { file } => config_ops::settings_validate(&file),
    }
}
