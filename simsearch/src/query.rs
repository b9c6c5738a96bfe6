//! Top-k lookups over the stored models, aligning on demand when needed.
use std::time::{Duration, Instant};

use rayon::prelude::*;
use stroke_align::{Aligner, StrokeCategory};

use crate::errors::{Result, SimsearchError};
use crate::glyph::{Glyph, GlyphRepository};
use crate::model::NeighborEntry;
use crate::snapshot::{self, Snapshot};
use crate::store::ModelStore;
use crate::topk::{Candidate, TopK};

/// Answers nearest-neighbour queries. It never writes to the store.
///
/// A query is served from the stored model of the glyph when it holds enough entries.
/// Otherwise the glyph is aligned against every valid glyph of the repository, which gives
/// the same ranking the builder would.
pub struct QueryService<R, S> {
    repo: R,
    store: S,
    aligner: Aligner,
}

impl<R, S> QueryService<R, S>
where
    R: GlyphRepository,
    S: ModelStore,
{
    /// Creates an instance.
    pub fn new(repo: R, store: S, aligner: Aligner) -> Self {
        Self {
            repo,
            store,
            aligner,
        }
    }

    /// Gets the glyph repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Gets the model store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gets the aligner used for on-demand alignment.
    pub fn aligner(&self) -> &Aligner {
        &self.aligner
    }

    /// Gets the `k` nearest neighbours of `glyph`, most similar first.
    ///
    /// # Errors
    ///
    /// An error is returned when
    ///
    /// - `k` or `timeout` is zero,
    /// - the store cannot be read,
    /// - the glyph has to be aligned but is unknown or has unusable strokes, or
    /// - the alignment does not finish within `timeout`.
    pub fn query(
        &self,
        glyph: &str,
        k: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<NeighborEntry>> {
        let deadline = Self::deadline(k, timeout)?;
        if let Some(model) = self.store.get_model(glyph)? {
            if model.len() >= k {
                return Ok(model.top(k).to_vec());
            }
            tracing::debug!(glyph, "stored model has {} < {k} entries", model.len());
        }

        let source = self
            .repo
            .get_glyph(glyph)?
            .ok_or_else(|| SimsearchError::not_found(glyph))?;
        let strokes = self.resolve(&source)?;
        self.rank(&strokes, Some(glyph), k, deadline, timeout)
    }

    /// Gets the `k` glyphs nearest to a raw sequence of stroke codes, always by alignment.
    pub fn query_strokes<I, T>(
        &self,
        codes: I,
        k: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<NeighborEntry>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let deadline = Self::deadline(k, timeout)?;
        let source = Glyph::new("", codes.into_iter().map(|c| c.as_ref().to_string()));
        let strokes = self.resolve(&source)?;
        self.rank(&strokes, None, k, deadline, timeout)
    }

    /// Resolves a glyph of the repository, giving `None` if it is unknown or unusable.
    pub fn strokes(&self, glyph: &str) -> Result<Option<Vec<StrokeCategory>>> {
        Ok(self
            .repo
            .get_glyph(glyph)?
            .and_then(|g| snapshot::resolve(self.aligner.taxonomy(), &g).ok()))
    }

    fn deadline(k: usize, timeout: Option<Duration>) -> Result<Option<Instant>> {
        if k == 0 {
            return Err(SimsearchError::input("k must not be 0."));
        }
        match timeout {
            Some(t) if t.is_zero() => Err(SimsearchError::input("timeout must not be 0.")),
            Some(t) => Ok(Instant::now().checked_add(t)),
            None => Ok(None),
        }
    }

    fn resolve(&self, glyph: &Glyph) -> Result<Vec<StrokeCategory>> {
        snapshot::resolve(self.aligner.taxonomy(), glyph)
            .map_err(|kind| SimsearchError::data_integrity(glyph.id(), kind))
    }

    fn rank(
        &self,
        strokes: &[StrokeCategory],
        exclude: Option<&str>,
        k: usize,
        deadline: Option<Instant>,
        timeout: Option<Duration>,
    ) -> Result<Vec<NeighborEntry>> {
        let expired = || deadline.map_or(false, |d| Instant::now() >= d);
        let timed_out = || SimsearchError::timeout(timeout.unwrap_or_default());

        let (snapshot, defects) = Snapshot::new(self.aligner.taxonomy(), self.repo.list_glyphs()?);
        if !defects.is_empty() {
            tracing::debug!("{} glyphs are not comparable", defects.len());
        }
        if expired() {
            return Err(timed_out());
        }

        let aligner = &self.aligner;
        let candidates: Option<Vec<Candidate>> = (0..snapshot.len())
            .into_par_iter()
            .filter(|&i| exclude != Some(snapshot.ids[i].as_str()))
            .map(|i| {
                if expired() {
                    return None;
                }
                let score = aligner.align(strokes, &snapshot.strokes[i]);
                Some(Candidate { score, index: i })
            })
            .collect();
        let candidates = candidates.ok_or_else(timed_out)?;

        let mut top = TopK::new(k);
        for candidate in candidates {
            top.push(candidate);
        }
        Ok(top
            .into_sorted_vec()
            .into_iter()
            .map(|c| NeighborEntry::new(&snapshot.ids[c.index], c.score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use rand::{Rng, SeedableRng};
    use stroke_align::{Taxonomy, TaxonomyConfig};

    use crate::builder::ModelBuilder;
    use crate::errors::StoreError;
    use crate::glyph::MemoryGlyphRepository;
    use crate::model::GlyphModel;
    use crate::store::MemoryModelStore;

    fn example_aligner() -> Aligner {
        let config = TaxonomyConfig::new(1., 1., 0.5)
            .category("vert", "vertical", Vec::<String>::new())
            .category("horiz", "horizontal", Vec::<String>::new())
            .category("dot", "dot", Vec::<String>::new())
            .category("hook", "vertical", Vec::<String>::new());
        Aligner::new(Arc::new(Taxonomy::from_config(&config).unwrap()))
    }

    fn scenario_repo() -> MemoryGlyphRepository {
        MemoryGlyphRepository::from_glyphs([
            Glyph::new("A", ["vert", "horiz"]),
            Glyph::new("B", ["vert", "horiz"]),
            Glyph::new("C", ["horiz", "vert", "dot"]),
        ])
    }

    fn random_repo(num_glyphs: usize, max_len: usize, seed: u64) -> MemoryGlyphRepository {
        const CODES: [&str; 4] = ["vert", "horiz", "dot", "hook"];
        let mut rng = rand_xoshiro::SplitMix64::seed_from_u64(seed);
        MemoryGlyphRepository::from_glyphs((0..num_glyphs).map(|i| {
            let len = rng.gen_range(1..=max_len);
            let strokes: Vec<_> = (0..len).map(|_| CODES[rng.gen_range(0..CODES.len())]).collect();
            Glyph::new(&format!("g{i:04}"), strokes)
        }))
    }

    #[test]
    fn test_scenario() {
        let store = MemoryModelStore::new();
        ModelBuilder::new(example_aligner(), 2)
            .unwrap()
            .build(&scenario_repo(), &store, None)
            .unwrap();
        let service = QueryService::new(scenario_repo(), store, example_aligner());
        let results = service.query("A", 2, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], NeighborEntry::new("B", 0.));
        assert_eq!(results[1].glyph, "C");
        assert!(results[1].score > 0.);
    }

    #[test]
    fn test_served_from_model() {
        let store = MemoryModelStore::new();
        let stored = GlyphModel::new(
            "A",
            vec![NeighborEntry::new("C", 0.1), NeighborEntry::new("B", 0.2)],
            "",
        );
        store.put_model(&stored).unwrap();
        let service = QueryService::new(scenario_repo(), store, example_aligner());
        assert_eq!(service.query("A", 1, None).unwrap(), stored.top(1));
        assert_eq!(service.query("A", 2, None).unwrap(), stored.neighbors());
    }

    #[test]
    fn test_fallback_matches_build() {
        let repo = random_repo(100, 8, 17);
        let built = MemoryModelStore::new();
        ModelBuilder::new(example_aligner(), 10)
            .unwrap()
            .build(&repo, &built, None)
            .unwrap();

        let service = QueryService::new(repo, MemoryModelStore::new(), example_aligner());
        for model in built.models() {
            let results = service.query(model.glyph(), 10, None).unwrap();
            assert_eq!(results, model.neighbors());
        }
    }

    #[test]
    fn test_fallback_on_short_model() {
        let store = MemoryModelStore::new();
        ModelBuilder::new(example_aligner(), 1)
            .unwrap()
            .build(&scenario_repo(), &store, None)
            .unwrap();
        let service = QueryService::new(scenario_repo(), store, example_aligner());
        let results = service.query("C", 2, None).unwrap();
        assert_eq!(
            results,
            vec![NeighborEntry::new("A", 2. / 3.), NeighborEntry::new("B", 2. / 3.)]
        );
    }

    #[test]
    fn test_query_strokes() {
        let service =
            QueryService::new(scenario_repo(), MemoryModelStore::new(), example_aligner());
        let results = service.query_strokes(["vert", "horiz"], 3, None).unwrap();
        assert_eq!(results[0], NeighborEntry::new("A", 0.));
        assert_eq!(results[1], NeighborEntry::new("B", 0.));
        assert_eq!(results[2].glyph, "C");

        assert!(matches!(
            service.query_strokes(["zigzag"], 3, None),
            Err(SimsearchError::DataIntegrity(_))
        ));
        assert!(matches!(
            service.query_strokes(Vec::<String>::new(), 3, None),
            Err(SimsearchError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_errors() {
        let mut repo = scenario_repo();
        repo.insert(Glyph::new("M", ["zigzag"]));
        let service = QueryService::new(repo, MemoryModelStore::new(), example_aligner());
        assert!(matches!(
            service.query("Z", 2, None),
            Err(SimsearchError::NotFound(e)) if e.glyph() == "Z"
        ));
        assert!(matches!(
            service.query("M", 2, None),
            Err(SimsearchError::DataIntegrity(e)) if e.glyph() == "M"
        ));
        assert!(matches!(
            service.query("A", 0, None),
            Err(SimsearchError::Input(_))
        ));
        assert!(matches!(
            service.query("A", 2, Some(Duration::ZERO)),
            Err(SimsearchError::Input(_))
        ));
        // Unusable glyphs are not candidates either.
        let results = service.query("A", 10, None).unwrap();
        assert_eq!(results.len(), 2);
    }

    struct UnavailableStore;

    impl ModelStore for UnavailableStore {
        fn put_model(&self, _: &GlyphModel) -> std::result::Result<(), StoreError> {
            Err(StoreError::new("store is down"))
        }

        fn get_model(&self, _: &str) -> std::result::Result<Option<GlyphModel>, StoreError> {
            Err(StoreError::new("store is down"))
        }
    }

    #[test]
    fn test_store_unavailable() {
        let service = QueryService::new(scenario_repo(), UnavailableStore, example_aligner());
        assert!(matches!(
            service.query("A", 1, None),
            Err(SimsearchError::Store(_))
        ));
        // The store is read before the repository.
        assert!(matches!(
            service.query("Z", 1, None),
            Err(SimsearchError::Store(_))
        ));
    }

    #[test]
    fn test_timeout() {
        let repo = random_repo(3000, 32, 5);
        let service = QueryService::new(repo, MemoryModelStore::new(), example_aligner());
        assert!(matches!(
            service.query("g0000", 5, Some(Duration::from_nanos(1))),
            Err(SimsearchError::Timeout(_))
        ));
        assert_eq!(
            service
                .query("g0000", 5, Some(Duration::from_secs(600)))
                .unwrap()
                .len(),
            5
        );
    }

    #[test]
    fn test_strokes() {
        let mut repo = scenario_repo();
        repo.insert(Glyph::new("M", ["zigzag"]));
        let service = QueryService::new(repo, MemoryModelStore::new(), example_aligner());
        assert_eq!(service.strokes("C").unwrap().map(|s| s.len()), Some(3));
        assert_eq!(service.strokes("M").unwrap(), None);
        assert_eq!(service.strokes("Z").unwrap(), None);
    }
}
