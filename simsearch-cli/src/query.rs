use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use simsearch::model::DEFAULT_NEIGHBORS_RECALLED;
use simsearch::{DirModelStore, MemoryGlyphRepository, QueryService};
use stroke_align::Normalization;

#[allow(dead_code)]
mod common;

#[derive(Parser, Debug)]
#[clap(
    name = "simsearch-query",
    about = "A program to look up the glyphs most similar to a glyph or to a stroke sequence."
)]
struct Args {
    /// Glyph to look up.
    glyph: Option<String>,

    /// Stroke codes to look up instead of a glyph.
    #[clap(short = 'c', long, conflicts_with = "glyph", multiple_values = true)]
    strokes: Vec<String>,

    /// File path to a stroke file, with a glyph and its stroke codes on each line.
    #[clap(short = 'i', long)]
    glyph_path: PathBuf,

    /// Directory of the model store.
    #[clap(short = 'o', long)]
    store_dir: PathBuf,

    /// Number of neighbours to return (must be more than 0).
    #[clap(short = 'k', long, default_value_t = DEFAULT_NEIGHBORS_RECALLED)]
    k: usize,

    /// Time budget in milliseconds for aligning on demand. If None, unlimited.
    #[clap(short = 'T', long)]
    timeout_ms: Option<u64>,

    /// File path to a JSON taxonomy. If None, the built-in CJK taxonomy is used.
    #[clap(short = 't', long)]
    taxonomy_path: Option<PathBuf>,

    /// Score normalization, "none" or "max-length".
    /// It must match the one the models were built with.
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

    let timeout = args.timeout_ms.map(Duration::from_millis);
    let start = Instant::now();
    let results = match (&args.glyph, args.strokes.is_empty()) {
        (Some(glyph), _) => service.query(glyph, args.k, timeout)?,
        (None, false) => service.query_strokes(&args.strokes, args.k, timeout)?,
        (None, true) => return Err(anyhow!("either a glyph or --strokes is required")),
    };
    tracing::info!("Done in {} sec", start.elapsed().as_secs_f64());

    println!("glyph,score");
    for entry in results {
        println!("{},{}", entry.glyph, entry.score);
    }

    Ok(())
}
