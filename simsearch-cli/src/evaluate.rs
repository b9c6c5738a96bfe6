use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use simsearch::simulate::{self, DEFAULT_PATH_LIMIT};

#[allow(dead_code)]
mod common;

#[derive(Parser, Debug)]
#[clap(
    name = "simsearch-evaluate",
    about = "A program to summarize simulated search traces."
)]
struct Args {
    /// File path to a trace file.
    trace_path: PathBuf,

    /// Number of steps a failed search counts as.
    #[clap(short = 'l', long, default_value_t = DEFAULT_PATH_LIMIT)]
    limit: usize,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();

    let file = File::open(&args.trace_path)
        .with_context(|| format!("opening {}", args.trace_path.display()))?;
    let traces = simulate::load_traces(file)?;
    let stats = simulate::evaluate(&traces, args.limit);

    println!(
        "Success rate: {}/{} ({:.2})",
        stats.num_successes,
        stats.num_traces,
        100. * stats.success_rate()
    );
    println!(
        "Mean path length: {:.2} (σ = {:.2})",
        stats.mean_length, stats.std_length
    );

    Ok(())
}
