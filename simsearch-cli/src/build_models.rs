use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use simsearch::model::DEFAULT_NEIGHBORS_STORED;
use simsearch::{DirModelStore, MemoryGlyphRepository, ModelBuilder, RetryPolicy};
use stroke_align::Normalization;

mod common;

#[derive(Parser, Debug)]
#[clap(
    name = "simsearch-build",
    about = "A program to build the nearest-neighbour models of glyphs."
)]
struct Args {
    /// File path to a stroke file, with a glyph and its stroke codes on each line.
    #[clap(short = 'i', long)]
    glyph_path: PathBuf,

    /// Directory of the model store, created if needed.
    #[clap(short = 'o', long)]
    store_dir: PathBuf,

    /// Number of neighbours kept per glyph (must be more than 0).
    #[clap(short = 'k', long, default_value_t = DEFAULT_NEIGHBORS_STORED)]
    k: usize,

    /// File path to a JSON taxonomy. If None, the built-in CJK taxonomy is used.
    #[clap(short = 't', long)]
    taxonomy_path: Option<PathBuf>,

    /// Score normalization.
    /// "none" keeps raw edit costs.
    /// "max-length" divides them by the longer sequence length.
    #[clap(short = 'n', long, default_value = "max-length")]
    normalization: Normalization,

    /// Glyphs to rebuild. If none, all the glyphs are built.
    #[clap(short = 's', long)]
    subset: Vec<String>,

    /// Rebuilds models even if they are up to date.
    #[clap(short = 'f', long)]
    force: bool,

    /// Number of attempts for each model write.
    #[clap(long, default_value = "3")]
    max_attempts: usize,

    /// Milliseconds to wait before retrying a failed write, doubled for each retry.
    #[clap(long, default_value = "50")]
    backoff_ms: u64,

    /// Number of worker threads. If None, one per core.
    #[clap(short = 'j', long)]
    threads: Option<usize>,

    /// Disables parallel construction.
    #[clap(short = 'p', long)]
    disable_parallel: bool,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();
    common::init_threads(args.threads)?;

    let aligner = common::load_aligner(args.taxonomy_path.as_deref(), args.normalization)?;
    let repo = MemoryGlyphRepository::load_stroke_file(&args.glyph_path)?;
    tracing::info!("Loaded {} glyphs", repo.len());
    let store = DirModelStore::open(&args.store_dir)
        .with_context(|| format!("opening the store {}", args.store_dir.display()))?;

    let policy = RetryPolicy {
        max_attempts: args.max_attempts.max(1),
        initial_backoff: Duration::from_millis(args.backoff_ms),
    };
    let builder = ModelBuilder::new(aligner, args.k)?
        .shows_progress(true)
        .in_parallel(!args.disable_parallel)
        .force(args.force)
        .retry_policy(policy);

    let subset = (!args.subset.is_empty()).then(|| args.subset.as_slice());
    let start = Instant::now();
    let report = builder.build(&repo, &store, subset)?;
    tracing::info!("Done in {} sec", start.elapsed().as_secs_f64());

    for defect in &report.defects {
        eprintln!("{defect}");
    }
    println!(
        "glyphs={},processed={},written={},unchanged={},up_to_date={},defects={}",
        report.num_glyphs,
        report.num_processed,
        report.num_written,
        report.num_unchanged,
        report.num_up_to_date,
        report.num_defects()
    );

    Ok(())
}
