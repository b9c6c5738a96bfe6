//! Edit-distance alignment of stroke sequences.
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::taxonomy::{StrokeCategory, Taxonomy};

/// Scaling applied to a raw alignment distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Normalization {
    /// The raw minimum cost.
    None,
    /// The raw minimum cost divided by the length of the longer sequence.
    #[default]
    MaxLength,
}

impl FromStr for Normalization {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "max-length" => Ok(Self::MaxLength),
            _ => Err("Could not parse a normalization value"),
        }
    }
}

/// Computes distance-like similarity scores between stroke sequences:
/// 0 for identical sequences, larger for less similar ones.
///
/// Scores are symmetric and deterministic. Swapping the arguments evaluates
/// the transposed DP table, which yields bit-identical values.
#[derive(Clone, Debug)]
pub struct Aligner {
    taxonomy: Arc<Taxonomy>,
    normalization: Normalization,
}

impl Aligner {
    /// Creates an instance normalizing by the longer sequence length.
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            normalization: Normalization::default(),
        }
    }

    /// Sets the normalization.
    pub fn normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Gets the normalization in use.
    pub const fn normalization_mode(&self) -> Normalization {
        self.normalization
    }

    /// Gets the underlying taxonomy.
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Computes the raw minimum cost of substitutions, insertions, and deletions
    /// transforming `a` into `b`.
    pub fn distance(&self, a: &[StrokeCategory], b: &[StrokeCategory]) -> f64 {
        self.run(a, b, None)
            .expect("an unbounded alignment always completes")
    }

    /// Computes the normalized score between `a` and `b`.
    pub fn align(&self, a: &[StrokeCategory], b: &[StrokeCategory]) -> f64 {
        self.normalize(self.distance(a, b), a.len(), b.len())
    }

    /// Computes the normalized score if it is within `bound`,
    /// abandoning the DP as soon as a whole row exceeds it.
    pub fn align_within(
        &self,
        a: &[StrokeCategory],
        b: &[StrokeCategory],
        bound: f64,
    ) -> Option<f64> {
        let score = self.normalize(self.run(a, b, Some(bound))?, a.len(), b.len());
        if score <= bound {
            Some(score)
        } else {
            None
        }
    }

    /// Gets a lower bound of [`Self::align`] for any sequences of the given lengths.
    pub fn lower_bound(&self, len_a: usize, len_b: usize) -> f64 {
        self.normalize(self.indel_run(len_a.abs_diff(len_b)), len_a, len_b)
    }

    /// Applies the normalization to a raw distance.
    #[inline(always)]
    pub fn normalize(&self, raw: f64, len_a: usize, len_b: usize) -> f64 {
        match self.normalization {
            Normalization::None => raw,
            Normalization::MaxLength => {
                let longest = len_a.max(len_b);
                if longest == 0 {
                    0.
                } else {
                    raw / longest as f64
                }
            }
        }
    }

    // Accumulates the indel cost the same way as the DP boundary does,
    // so that the result never exceeds a DP value with `n` indels.
    fn indel_run(&self, n: usize) -> f64 {
        let indel = self.taxonomy.indel_cost();
        (0..n).fold(0., |acc, _| acc + indel)
    }

    fn run(&self, a: &[StrokeCategory], b: &[StrokeCategory], bound: Option<f64>) -> Option<f64> {
        // The shorter sequence spans the columns to keep the rows small.
        let (rows, cols) = if a.len() < b.len() { (b, a) } else { (a, b) };
        let indel = self.taxonomy.indel_cost();

        let mut prev = Vec::with_capacity(cols.len() + 1);
        let mut acc = 0.;
        prev.push(acc);
        for _ in cols {
            acc += indel;
            prev.push(acc);
        }
        let mut curr = vec![0.; cols.len() + 1];

        for &x in rows {
            curr[0] = prev[0] + indel;
            let mut row_min = curr[0];
            for (j, &y) in cols.iter().enumerate() {
                let substitute = prev[j] + self.taxonomy.cost(x, y);
                let delete = prev[j + 1] + indel;
                let insert = curr[j] + indel;
                let v = substitute.min(delete).min(insert);
                curr[j + 1] = v;
                row_min = row_min.min(v);
            }
            // Row minima never decrease, so the final cell cannot get back under the bound.
            if let Some(bound) = bound {
                if self.normalize(row_min, a.len(), b.len()) > bound {
                    return None;
                }
            }
            std::mem::swap(&mut prev, &mut curr);
        }
        Some(prev[cols.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::taxonomy::TaxonomyConfig;

    fn example_taxonomy() -> Arc<Taxonomy> {
        let config = TaxonomyConfig::new(1., 1., 0.5)
            .category("vert", "vertical", Vec::<String>::new())
            .category("horiz", "horizontal", Vec::<String>::new())
            .category("dot", "dot", Vec::<String>::new())
            .category("hook", "vertical", Vec::<String>::new());
        Arc::new(Taxonomy::from_config(&config).unwrap())
    }

    fn seq(aligner: &Aligner, codes: &str) -> Vec<StrokeCategory> {
        aligner
            .taxonomy()
            .resolve_all(codes.split_whitespace())
            .unwrap()
    }

    fn example_sequences(aligner: &Aligner) -> Vec<Vec<StrokeCategory>> {
        [
            "",
            "vert",
            "vert horiz",
            "horiz vert dot",
            "hook horiz horiz dot",
            "dot dot dot",
            "vert hook vert hook vert",
            "horiz horiz vert dot hook horiz",
            "dot vert",
        ]
        .iter()
        .map(|s| seq(aligner, s))
        .collect()
    }

    // Full-matrix textbook recurrence.
    fn naive_distance(taxonomy: &Taxonomy, a: &[StrokeCategory], b: &[StrokeCategory]) -> f64 {
        let indel = taxonomy.indel_cost();
        let mut table = vec![vec![0.; b.len() + 1]; a.len() + 1];
        for i in 1..=a.len() {
            table[i][0] = table[i - 1][0] + indel;
        }
        for j in 1..=b.len() {
            table[0][j] = table[0][j - 1] + indel;
        }
        for i in 1..=a.len() {
            for j in 1..=b.len() {
                let substitute = table[i - 1][j - 1] + taxonomy.cost(a[i - 1], b[j - 1]);
                let delete = table[i - 1][j] + indel;
                let insert = table[i][j - 1] + indel;
                table[i][j] = substitute.min(delete).min(insert);
            }
        }
        table[a.len()][b.len()]
    }

    #[test]
    fn test_matches_naive() {
        let aligner = Aligner::new(example_taxonomy());
        let seqs = example_sequences(&aligner);
        for a in &seqs {
            for b in &seqs {
                assert_eq!(
                    aligner.distance(a, b),
                    naive_distance(aligner.taxonomy(), a, b)
                );
            }
        }
    }

    #[test]
    fn test_identity() {
        let aligner = Aligner::new(example_taxonomy());
        for s in example_sequences(&aligner) {
            assert_eq!(aligner.distance(&s, &s), 0.);
            assert_eq!(aligner.align(&s, &s), 0.);
        }
    }

    #[test]
    fn test_symmetry() {
        let aligner = Aligner::new(example_taxonomy());
        let seqs = example_sequences(&aligner);
        for a in &seqs {
            for b in &seqs {
                assert_eq!(aligner.align(a, b), aligner.align(b, a));
            }
        }
    }

    #[test]
    fn test_single_insertion() {
        let aligner = Aligner::new(example_taxonomy());
        let dot = seq(&aligner, "dot")[0];
        for s in example_sequences(&aligner) {
            let mut t = s.clone();
            t.push(dot);
            assert_eq!(aligner.distance(&s, &t), 1.);
            t.insert(0, dot);
            t.pop();
            assert_eq!(aligner.distance(&s, &t), 1.);
        }
    }

    #[test]
    fn test_empty() {
        let aligner = Aligner::new(example_taxonomy()).normalization(Normalization::None);
        let s = seq(&aligner, "vert horiz dot");
        assert_eq!(aligner.align(&[], &s), 3.);
        assert_eq!(aligner.align(&s, &[]), 3.);
        assert_eq!(aligner.align(&[], &[]), 0.);

        let aligner = Aligner::new(example_taxonomy());
        assert_eq!(aligner.align(&[], &s), 1.);
        assert_eq!(aligner.align(&[], &[]), 0.);
    }

    #[test]
    fn test_scenario() {
        let aligner = Aligner::new(example_taxonomy());
        let a = seq(&aligner, "vert horiz");
        let b = seq(&aligner, "vert horiz");
        let c = seq(&aligner, "horiz vert dot");
        assert_eq!(aligner.align(&a, &b), 0.);
        // Insert "horiz", keep "vert", substitute "horiz" with "dot".
        assert_eq!(aligner.distance(&a, &c), 2.);
        assert_eq!(aligner.align(&a, &c), 2. / 3.);
    }

    #[test]
    fn test_family_substitution() {
        let aligner = Aligner::new(example_taxonomy()).normalization(Normalization::None);
        let a = seq(&aligner, "vert horiz");
        let b = seq(&aligner, "hook horiz");
        assert_eq!(aligner.align(&a, &b), 0.5);
    }

    #[test]
    fn test_align_within() {
        let aligner = Aligner::new(example_taxonomy());
        let seqs = example_sequences(&aligner);
        for bound in [0., 0.25, 0.5, 0.75, 1.] {
            for a in &seqs {
                for b in &seqs {
                    let score = aligner.align(a, b);
                    let expected = if score <= bound { Some(score) } else { None };
                    assert_eq!(aligner.align_within(a, b, bound), expected);
                }
            }
        }
    }

    #[test]
    fn test_lower_bound() {
        for normalization in [Normalization::None, Normalization::MaxLength] {
            let aligner = Aligner::new(example_taxonomy()).normalization(normalization);
            let seqs = example_sequences(&aligner);
            for a in &seqs {
                for b in &seqs {
                    assert!(aligner.lower_bound(a.len(), b.len()) <= aligner.align(a, b));
                }
            }
        }
    }

    #[test]
    fn test_normalization_from_str() {
        assert_eq!("none".parse(), Ok(Normalization::None));
        assert_eq!("max-length".parse(), Ok(Normalization::MaxLength));
        assert!("max".parse::<Normalization>().is_err());
    }
}
