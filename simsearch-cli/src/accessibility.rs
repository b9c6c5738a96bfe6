use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use simsearch::accessibility::{self, FreqDist};
use simsearch::model::DEFAULT_NEIGHBOURHOOD_THRESHOLD;
use simsearch::{DirModelStore, GlyphRepository, MemoryGlyphRepository};

#[allow(dead_code)]
mod common;

#[derive(Parser, Debug)]
#[clap(
    name = "simsearch-accessibility",
    about = "A program to simulate how many glyphs are accessible as glyphs are learned in frequency order."
)]
struct Args {
    /// File path to a frequency file, with a glyph and its count on each line.
    #[clap(short = 'F', long)]
    freq_path: PathBuf,

    /// File path to a stroke file listing the glyphs to learn.
    #[clap(short = 'i', long)]
    glyph_path: PathBuf,

    /// Directory of the model store.
    #[clap(short = 'o', long)]
    store_dir: PathBuf,

    /// File path to write the CSV curve to.
    #[clap(short = 'O', long)]
    output_path: PathBuf,

    /// Neighbourhood cutoff relative to the similarity of the best neighbour.
    #[clap(short = 't', long, default_value_t = DEFAULT_NEIGHBOURHOOD_THRESHOLD)]
    threshold: f64,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();

    let dist = FreqDist::load(&args.freq_path)
        .with_context(|| format!("loading {}", args.freq_path.display()))?;
    tracing::info!("Loaded {} frequencies", dist.len());
    let repo = MemoryGlyphRepository::load_stroke_file(&args.glyph_path)?;
    let glyphs: Vec<_> = repo
        .list_glyphs()?
        .into_iter()
        .map(|g| g.id().to_string())
        .collect();
    let store = DirModelStore::open(&args.store_dir)
        .with_context(|| format!("opening the store {}", args.store_dir.display()))?;

    let curve = accessibility::simulate_accessibility(&glyphs, &dist, &store, args.threshold)?;

    let file = File::create(&args.output_path)
        .with_context(|| format!("creating {}", args.output_path.display()))?;
    curve.write_csv(BufWriter::new(file))?;
    tracing::info!("Curve dumped to {}", args.output_path.display());
    println!(
        "Average neighbourhood size: {:.3} (σ = {:.3})",
        curve.mean_neighbourhood, curve.std_neighbourhood
    );

    Ok(())
}
