use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use simsearch::model::DEFAULT_NEIGHBORS_RECALLED;
use simsearch::simulate::{self, Simulator, Strategy, DEFAULT_PATH_LIMIT};
use simsearch::{DirModelStore, MemoryGlyphRepository, QueryService};
use stroke_align::Normalization;

#[allow(dead_code)]
mod common;

#[derive(Parser, Debug)]
#[clap(
    name = "simsearch-simulate",
    about = "A program to simulate searches through the neighbour graph, dumping the traces."
)]
struct Args {
    /// File path to search pairs, with a query glyph followed by its targets on each line.
    #[clap(short = 'q', long)]
    pair_path: PathBuf,

    /// File path to write the traces to.
    #[clap(short = 'O', long)]
    output_path: PathBuf,

    /// File path to a stroke file, with a glyph and its stroke codes on each line.
    #[clap(short = 'i', long)]
    glyph_path: PathBuf,

    /// Directory of the model store.
    #[clap(short = 'o', long)]
    store_dir: PathBuf,

    /// Search strategy.
    /// "greedy" moves to the neighbour looking closest to the target.
    /// "shortest" finds the shortest path breadth-first.
    #[clap(short = 'S', long, default_value = "greedy")]
    strategy: Strategy,

    /// Maximum number of steps per search.
    #[clap(short = 'l', long, default_value_t = DEFAULT_PATH_LIMIT)]
    limit: usize,

    /// Number of neighbours shown at each step.
    #[clap(short = 'k', long, default_value_t = DEFAULT_NEIGHBORS_RECALLED)]
    recalled: usize,

    /// File path to a JSON taxonomy. If None, the built-in CJK taxonomy is used.
    #[clap(short = 't', long)]
    taxonomy_path: Option<PathBuf>,

    /// Score normalization, "none" or "max-length".
    #[clap(short = 'n', long, default_value = "max-length")]
    normalization: Normalization,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();

    let aligner = common::load_aligner(args.taxonomy_path.as_deref(), args.normalization)?;
    let repo = MemoryGlyphRepository::load_stroke_file(&args.glyph_path)?;
    let store = DirModelStore::open(&args.store_dir)
        .with_context(|| format!("opening the store {}", args.store_dir.display()))?;
    let service = QueryService::new(repo, store, aligner);

    let pairs = simulate::load_search_pairs(
        File::open(&args.pair_path)
            .with_context(|| format!("opening {}", args.pair_path.display()))?,
    )?;
    tracing::info!("Simulating {} searches", pairs.len());

    let mut simulator = Simulator::new(&service, args.strategy)
        .limit(args.limit)
        .recalled(args.recalled)?;
    let traces = simulator.run(pairs)?;

    let file = File::create(&args.output_path)
        .with_context(|| format!("creating {}", args.output_path.display()))?;
    simulate::save_traces(&traces, BufWriter::new(file))?;
    tracing::info!("Paths dumped to {}", args.output_path.display());

    Ok(())
}
