use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use stroke_align::{Aligner, Normalization, Taxonomy, TaxonomyConfig};

/// Logs to stderr, at the level given by `RUST_LOG` or info.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Sizes the global rayon pool. `None` keeps one thread per core.
pub fn init_threads(num_threads: Option<usize>) -> Result<()> {
    if let Some(n) = num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("configuring the thread pool")?;
    }
    Ok(())
}

/// Builds an aligner over the taxonomy in a JSON file, or over the built-in CJK one.
pub fn load_aligner(taxonomy_path: Option<&Path>, normalization: Normalization) -> Result<Aligner> {
    let taxonomy = match taxonomy_path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let config = TaxonomyConfig::from_json(file)?;
            Taxonomy::from_config(&config)?
        }
        None => Taxonomy::cjk(),
    };
    tracing::info!("Loaded {} stroke categories", taxonomy.len());
    Ok(Aligner::new(Arc::new(taxonomy)).normalization(normalization))
}
