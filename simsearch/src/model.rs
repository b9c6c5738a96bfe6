//! Persisted nearest-neighbour lists.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Default number of neighbours stored per glyph.
pub const DEFAULT_NEIGHBORS_STORED: usize = 100;
/// Default number of neighbours recalled per query.
pub const DEFAULT_NEIGHBORS_RECALLED: usize = 15;
/// Default similarity ratio to the best neighbour for [`GlyphModel::neighbourhood`].
pub const DEFAULT_NEIGHBOURHOOD_THRESHOLD: f64 = 0.95;

/// A neighbouring glyph and its score (lower is more similar).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborEntry {
    /// Identifier of the neighbour.
    pub glyph: String,
    /// Alignment score to the neighbour.
    pub score: f64,
}

impl NeighborEntry {
    /// Creates an instance.
    pub fn new(glyph: &str, score: f64) -> Self {
        Self {
            glyph: glyph.to_string(),
            score,
        }
    }

    /// Orders by ascending score, breaking ties by ascending identifier.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.glyph.cmp(&other.glyph))
    }
}

/// The ranked neighbours of one glyph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlyphModel {
    glyph: String,
    neighbors: Vec<NeighborEntry>,
    /// Digest of the build inputs that produced this model.
    #[serde(default)]
    fingerprint: String,
}

impl GlyphModel {
    /// Creates an instance. `neighbors` must already be ranked.
    pub fn new(glyph: &str, neighbors: Vec<NeighborEntry>, fingerprint: &str) -> Self {
        Self {
            glyph: glyph.to_string(),
            neighbors,
            fingerprint: fingerprint.to_string(),
        }
    }

    /// Gets the identifier of the source glyph.
    pub fn glyph(&self) -> &str {
        &self.glyph
    }

    /// Gets all the neighbours, most similar first.
    pub fn neighbors(&self) -> &[NeighborEntry] {
        &self.neighbors
    }

    /// Gets the first `k` neighbours at most.
    pub fn top(&self, k: usize) -> &[NeighborEntry] {
        &self.neighbors[..k.min(self.neighbors.len())]
    }

    /// Gets the build fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Gets the number of neighbours.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Checks if the model has no neighbour.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Checks that the glyph is not its own neighbour, that the scores are
    /// non-negative, and that the entries are strictly ranked.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.neighbors.iter().any(|n| n.glyph == self.glyph) {
            return Err("A glyph must not be its own neighbour.");
        }
        if self.neighbors.iter().any(|n| n.score.is_nan() || n.score < 0.) {
            return Err("Neighbour scores must be non-negative.");
        }
        if self
            .neighbors
            .windows(2)
            .any(|w| w[0].rank_cmp(&w[1]) != Ordering::Less)
        {
            return Err("Neighbours must be strictly ordered by score and identifier.");
        }
        Ok(())
    }

    /// Gets the neighbours among the first `k` whose similarity (`1 - score`)
    /// reaches `threshold` times the similarity of the best one.
    ///
    /// Similarities are only meaningful for scores in `[0, 1]`, that is, models built
    /// with [`Normalization::MaxLength`]. If the best neighbour has no similarity left,
    /// as with raw costs of 1 or more, only the neighbours tied with it are kept.
    ///
    /// [`Normalization::MaxLength`]: stroke_align::Normalization::MaxLength
    pub fn neighbourhood(&self, k: usize, threshold: f64) -> Vec<&NeighborEntry> {
        let top = self.top(k);
        let first = match top.first() {
            Some(first) => first,
            None => return vec![],
        };
        let best = similarity(first.score);
        if best <= 0. {
            return top.iter().filter(|n| n.score == first.score).collect();
        }
        top.iter()
            .filter(|n| similarity(n.score) >= threshold * best)
            .collect()
    }
}

fn similarity(score: f64) -> f64 {
    (1. - score).max(0.)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_model() -> GlyphModel {
        GlyphModel::new(
            "A",
            vec![
                NeighborEntry::new("B", 0.),
                NeighborEntry::new("D", 0.02),
                NeighborEntry::new("C", 0.5),
                NeighborEntry::new("E", 0.5),
            ],
            "",
        )
    }

    #[test]
    fn test_top() {
        let model = example_model();
        assert_eq!(model.top(2).len(), 2);
        assert_eq!(model.top(10).len(), 4);
        assert_eq!(model.top(0).len(), 0);
    }

    #[test]
    fn test_validate() {
        assert!(example_model().validate().is_ok());

        let swapped = GlyphModel::new(
            "A",
            vec![NeighborEntry::new("C", 0.5), NeighborEntry::new("B", 0.)],
            "",
        );
        assert!(swapped.validate().is_err());

        let tie_misordered = GlyphModel::new(
            "A",
            vec![NeighborEntry::new("E", 0.5), NeighborEntry::new("C", 0.5)],
            "",
        );
        assert!(tie_misordered.validate().is_err());

        let duplicated = GlyphModel::new(
            "A",
            vec![NeighborEntry::new("C", 0.5), NeighborEntry::new("C", 0.5)],
            "",
        );
        assert!(duplicated.validate().is_err());

        let with_self = GlyphModel::new("A", vec![NeighborEntry::new("A", 0.)], "");
        assert!(with_self.validate().is_err());
    }

    #[test]
    fn test_neighbourhood() {
        let model = example_model();
        let ids: Vec<_> = model
            .neighbourhood(10, DEFAULT_NEIGHBOURHOOD_THRESHOLD)
            .iter()
            .map(|n| n.glyph.as_str())
            .collect();
        assert_eq!(ids, vec!["B", "D"]);
        assert_eq!(model.neighbourhood(10, 0.).len(), 4);
        assert_eq!(model.neighbourhood(1, 0.).len(), 1);
        assert!(GlyphModel::new("A", vec![], "").neighbourhood(10, 0.5).is_empty());
    }

    #[test]
    fn test_neighbourhood_raw_costs() {
        let model = GlyphModel::new(
            "A",
            vec![
                NeighborEntry::new("B", 2.),
                NeighborEntry::new("C", 2.),
                NeighborEntry::new("D", 3.5),
                NeighborEntry::new("E", 7.),
            ],
            "",
        );
        let ids: Vec<_> = model
            .neighbourhood(10, DEFAULT_NEIGHBOURHOOD_THRESHOLD)
            .iter()
            .map(|n| n.glyph.as_str())
            .collect();
        assert_eq!(ids, vec!["B", "C"]);
        assert_eq!(model.neighbourhood(1, 0.).len(), 1);
    }

    #[test]
    fn test_json_layout() {
        let model = GlyphModel::new("A", vec![NeighborEntry::new("B", 0.25)], "ab12");
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(
            json,
            r#"{"glyph":"A","neighbors":[{"glyph":"B","score":0.25}],"fingerprint":"ab12"}"#
        );
        let back: GlyphModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
