//! Estimates how many glyphs become reachable through similarity search as a learner
//! acquires glyphs in frequency order.
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::path::Path;

use hashbrown::{HashMap, HashSet};
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::errors::Result;
use crate::store::ModelStore;

/// Number of learned glyphs between two points of the curve.
pub const SAMPLE_INTERVAL: usize = 50;
/// Seed of the shuffle ordering glyphs of equal frequency.
pub const SHUFFLE_SEED: u64 = 123456789;

/// Counts of samples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreqDist {
    counts: HashMap<String, u64>,
    total: u64,
}

impl FreqDist {
    /// Creates an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads counts from a file of `<sample> <count>` lines.
    pub fn load<P>(path: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        Self::from_reader(File::open(path)?)
    }

    /// Loads counts from a reader of `<sample> <count>` lines.
    /// Repeated samples accumulate.
    pub fn from_reader<R>(rdr: R) -> io::Result<Self>
    where
        R: Read,
    {
        let mut dist = Self::new();
        for (i, line) in BufReader::new(rdr).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = || {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("line {}: expected <sample> <count>", i + 1),
                )
            };
            let mut tokens = line.split_whitespace();
            let (sample, count) = match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(sample), Some(count), None) => (sample, count),
                _ => return Err(invalid()),
            };
            let count = count.parse().map_err(|_| invalid())?;
            dist.inc(sample, count);
        }
        Ok(dist)
    }

    /// Adds `n` to the count of `sample`.
    pub fn inc(&mut self, sample: &str, n: u64) {
        *self.counts.entry(sample.to_string()).or_insert(0) += n;
        self.total += n;
    }

    /// Gets the count of `sample`.
    pub fn count(&self, sample: &str) -> u64 {
        self.counts.get(sample).copied().unwrap_or(0)
    }

    /// Gets the maximum likelihood estimate of the probability of `sample`.
    pub fn prob(&self, sample: &str) -> f64 {
        match self.count(sample) {
            0 => 0.,
            c => c as f64 / self.total as f64,
        }
    }

    /// Gets the sum of all the counts.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Gets the number of distinct samples.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Checks if no sample was counted.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Result of [`simulate_accessibility`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccessibilityCurve {
    /// Pairs of the numbers of known and accessible glyphs, starting from `(0, 0)`.
    pub points: Vec<(usize, usize)>,
    /// Mean size of the neighbourhoods of the learned glyphs.
    pub mean_neighbourhood: f64,
    /// Population standard deviation of the neighbourhood sizes.
    pub std_neighbourhood: f64,
}

impl AccessibilityCurve {
    /// Writes the points as CSV with a `#n_known,n_accessible` header.
    pub fn write_csv<W>(&self, mut wtr: W) -> io::Result<()>
    where
        W: Write,
    {
        writeln!(wtr, "#n_known,n_accessible")?;
        for (known, accessible) in &self.points {
            writeln!(wtr, "{known},{accessible}")?;
        }
        Ok(())
    }
}

/// Learns `glyphs` most frequent first and records how many glyphs are accessible,
/// that is, known or in the neighbourhood of a known glyph.
///
/// Neighbourhoods come from the stored models, cut by [`GlyphModel::neighbourhood`]
/// with `threshold`. Glyphs without a stored model have an empty neighbourhood.
///
/// [`GlyphModel::neighbourhood`]: crate::model::GlyphModel::neighbourhood
pub fn simulate_accessibility<S>(
    glyphs: &[String],
    dist: &FreqDist,
    store: &S,
    threshold: f64,
) -> Result<AccessibilityCurve>
where
    S: ModelStore + ?Sized,
{
    let mut order: Vec<&String> = glyphs.iter().collect();
    let mut rng = rand_xoshiro::SplitMix64::seed_from_u64(SHUFFLE_SEED);
    order.shuffle(&mut rng);
    order.sort_by(|a, b| dist.count(b).cmp(&dist.count(a)));

    let mut known = HashSet::new();
    let mut accessible: HashSet<String> = HashSet::new();
    let mut sizes = Vec::with_capacity(order.len());
    let mut points = vec![(0, 0)];
    for (i, glyph) in order.iter().enumerate() {
        known.insert(glyph.as_str());
        accessible.insert(glyph.to_string());
        match store.get_model(glyph)? {
            Some(model) => {
                let neighbourhood = model.neighbourhood(model.len(), threshold);
                sizes.push(neighbourhood.len());
                accessible.extend(neighbourhood.into_iter().map(|n| n.glyph.clone()));
            }
            None => {
                tracing::warn!(glyph = glyph.as_str(), "no stored model");
                sizes.push(0);
            }
        }
        if (i + 1) % SAMPLE_INTERVAL == 0 {
            points.push((known.len(), accessible.len()));
        }
    }
    points.push((known.len(), accessible.len()));

    let (mean_neighbourhood, std_neighbourhood) = if sizes.is_empty() {
        (0., 0.)
    } else {
        let n = sizes.len() as f64;
        let mean = sizes.iter().sum::<usize>() as f64 / n;
        let var = sizes
            .iter()
            .map(|&s| (s as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    };
    Ok(AccessibilityCurve {
        points,
        mean_neighbourhood,
        std_neighbourhood,
    })
}
