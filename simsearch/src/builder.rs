//! Batch construction of glyph models over all pairs of glyphs.
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use stroke_align::{Aligner, Normalization};

use crate::errors::{Result, SimsearchError, StoreError};
use crate::glyph::GlyphRepository;
use crate::model::{GlyphModel, NeighborEntry};
use crate::snapshot::{Defect, DefectKind, Snapshot};
use crate::store::ModelStore;
use crate::topk::{Candidate, TopK};

const PROGRESS_INTERVAL: usize = 1000;

/// How often and how patiently a failed model write is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of attempts including the first one.
    pub max_attempts: usize,
    /// Sleep before the first retry, doubled for each further one.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

/// Outcome of [`ModelBuilder::build`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildReport {
    /// Number of glyphs listed by the repository.
    pub num_glyphs: usize,
    /// Number of glyphs whose model was computed.
    pub num_processed: usize,
    /// Number of models written to the store.
    pub num_written: usize,
    /// Number of computed models identical to the stored ones, hence not written.
    pub num_unchanged: usize,
    /// Number of glyphs skipped since their stored model came from the same inputs.
    pub num_up_to_date: usize,
    /// Problems with single glyphs.
    pub defects: Vec<Defect>,
}

impl BuildReport {
    /// Gets the number of defects.
    pub fn num_defects(&self) -> usize {
        self.defects.len()
    }
}

/// Builds the top-k nearest neighbours of every glyph and persists them as it goes.
///
/// Each unordered pair of glyphs is compared at most once and updates both sides.
/// A pair is skipped without alignment when its length difference alone already exceeds
/// what both sides' current k-th best scores would admit, and an alignment is abandoned
/// as soon as a DP row does. Both cuts only drop candidates that cannot make it into a
/// top-k, so the models do not depend on pruning or scheduling.
pub struct ModelBuilder {
    aligner: Aligner,
    k: usize,
    shows_progress: bool,
    in_parallel: bool,
    force: bool,
    retry_policy: RetryPolicy,
}

impl ModelBuilder {
    /// Creates an instance keeping `k` neighbours per glyph (must be more than 0).
    pub fn new(aligner: Aligner, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(SimsearchError::input("k must not be 0."));
        }
        Ok(Self {
            aligner,
            k,
            shows_progress: false,
            in_parallel: true,
            force: false,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Reports the progress via tracing at the info level?
    pub const fn shows_progress(mut self, yes: bool) -> Self {
        self.shows_progress = yes;
        self
    }

    /// Compares pairs on the rayon thread pool? Enabled by default.
    pub const fn in_parallel(mut self, yes: bool) -> Self {
        self.in_parallel = yes;
        self
    }

    /// Recomputes models even if the stored ones came from the same inputs?
    pub const fn force(mut self, yes: bool) -> Self {
        self.force = yes;
        self
    }

    /// Sets the retry policy for model writes.
    pub const fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Gets the number of neighbours kept per glyph.
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Builds and stores the models of all the glyphs in `repo`,
    /// or only of those listed in `subset`.
    ///
    /// Glyphs with unusable stroke data are excluded from both sides of every comparison
    /// and reported as defects, as are models that could not be written.
    /// Only a failure to list the glyphs aborts the build.
    pub fn build<R, S>(
        &self,
        repo: &R,
        store: &S,
        subset: Option<&[String]>,
    ) -> Result<BuildReport>
    where
        R: GlyphRepository + ?Sized,
        S: ModelStore + ?Sized,
    {
        let glyphs = repo.list_glyphs()?;
        let num_glyphs = glyphs.len();
        let (snapshot, mut defects) = Snapshot::new(self.aligner.taxonomy(), glyphs);
        for defect in &defects {
            tracing::warn!(glyph = %defect.glyph, "excluded from the build: {}", defect.kind);
        }

        let fingerprint = self.fingerprint(&snapshot);
        if self.shows_progress {
            tracing::info!(
                "[ModelBuilder::build] #glyphs={num_glyphs}, #valid={}, #defects={}, k={}, fingerprint={fingerprint}",
                snapshot.len(),
                defects.len(),
                self.k,
            );
        }

        let mut report = BuildReport {
            num_glyphs,
            ..BuildReport::default()
        };
        let pending = self.pending(&snapshot, store, subset, &fingerprint, &mut report);
        report.num_processed = pending.iter().filter(|&&p| p).count();
        if self.shows_progress {
            tracing::info!(
                "[ModelBuilder::build] #pending={}, #up-to-date={}",
                report.num_processed,
                report.num_up_to_date
            );
        }

        let (tx, rx) = mpsc::channel();
        let outcome = thread::scope(|scope| {
            let writer = scope.spawn(move || self.write_models(store, rx));
            self.scan(&snapshot, &pending, &fingerprint, tx);
            writer
                .join()
                .unwrap_or_else(|e| std::panic::resume_unwind(e))
        });

        report.num_written = outcome.num_written;
        report.num_unchanged = outcome.num_unchanged;
        defects.extend(outcome.defects);
        report.defects = defects;
        if self.shows_progress {
            tracing::info!(
                "[ModelBuilder::build] Done: #written={}, #unchanged={}, #defects={}",
                report.num_written,
                report.num_unchanged,
                report.num_defects()
            );
        }
        Ok(report)
    }

    /// Digests everything a model depends on: k, the scoring, and all the valid glyphs.
    fn fingerprint(&self, snapshot: &Snapshot) -> String {
        let taxonomy = self.aligner.taxonomy();
        let mut hasher = Sha256::new();
        hasher.update((self.k as u64).to_le_bytes());
        hasher.update([match self.aligner.normalization_mode() {
            Normalization::None => 0u8,
            Normalization::MaxLength => 1u8,
        }]);
        hasher.update(taxonomy.indel_cost().to_bits().to_le_bytes());
        for a in taxonomy.categories() {
            for b in taxonomy.categories() {
                hasher.update(taxonomy.cost(a, b).to_bits().to_le_bytes());
            }
        }
        for (id, strokes) in snapshot.ids.iter().zip(&snapshot.strokes) {
            hasher.update((id.len() as u64).to_le_bytes());
            hasher.update(id.as_bytes());
            hasher.update((strokes.len() as u64).to_le_bytes());
            for s in strokes {
                hasher.update((s.index() as u64).to_le_bytes());
            }
        }
        let mut hex = String::with_capacity(64);
        for b in hasher.finalize() {
            let _ = write!(hex, "{b:02x}");
        }
        hex
    }

    /// Marks the glyphs whose model has to be computed.
    fn pending<S>(
        &self,
        snapshot: &Snapshot,
        store: &S,
        subset: Option<&[String]>,
        fingerprint: &str,
        report: &mut BuildReport,
    ) -> Vec<bool>
    where
        S: ModelStore + ?Sized,
    {
        let mut pending = match subset {
            None => vec![true; snapshot.len()],
            Some(ids) => {
                let mut pending = vec![false; snapshot.len()];
                for id in ids {
                    match snapshot.position(id) {
                        Some(i) => pending[i] = true,
                        None => tracing::warn!(glyph = %id, "requested glyph is unknown or excluded"),
                    }
                }
                pending
            }
        };
        if self.force {
            return pending;
        }
        for (i, p) in pending.iter_mut().enumerate() {
            if !*p {
                continue;
            }
            match store.get_model(&snapshot.ids[i]) {
                Ok(Some(model)) if model.fingerprint() == fingerprint => {
                    *p = false;
                    report.num_up_to_date += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(glyph = %snapshot.ids[i], "cannot read the stored model, rebuilding it: {e}");
                }
            }
        }
        pending
    }

    fn scan(&self, snapshot: &Snapshot, pending: &[bool], fingerprint: &str, tx: Sender<GlyphModel>) {
        let n = snapshot.len();
        let scan = Scan {
            aligner: &self.aligner,
            snapshot,
            pending,
            pending_list: (0..n).filter(|&i| pending[i]).collect(),
            heaps: pending
                .iter()
                .map(|&p| Mutex::new(TopK::new(if p { self.k } else { 0 })))
                .collect(),
            remaining: (0..n).map(|_| AtomicUsize::new(n - 1)).collect(),
            fingerprint,
            shows_progress: self.shows_progress,
            num_rows: AtomicUsize::new(0),
            num_aligned: AtomicUsize::new(0),
            num_pruned: AtomicUsize::new(0),
        };

        // A lone glyph has no pair to wait for.
        if n == 1 && pending[0] {
            scan.finish(0, &tx);
        }

        if self.in_parallel {
            (0..n)
                .into_par_iter()
                .for_each_with(tx, |tx, i| scan.row(i, tx));
        } else {
            (0..n).for_each(|i| scan.row(i, &tx));
        }

        if self.shows_progress {
            tracing::info!(
                "[ModelBuilder::build] #aligned-pairs={}, #pruned-pairs={}",
                scan.num_aligned.load(Ordering::Relaxed),
                scan.num_pruned.load(Ordering::Relaxed)
            );
        }
    }

    fn write_models<S>(&self, store: &S, rx: Receiver<GlyphModel>) -> WriteOutcome
    where
        S: ModelStore + ?Sized,
    {
        let mut outcome = WriteOutcome::default();
        for model in rx {
            match store.get_model(model.glyph()) {
                Ok(Some(stored)) if stored == model => {
                    outcome.num_unchanged += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(glyph = model.glyph(), "cannot compare with the stored model: {e}"),
            }
            match self.put_with_retry(store, &model) {
                Ok(()) => {
                    outcome.num_written += 1;
                    if self.shows_progress && outcome.num_written % PROGRESS_INTERVAL == 0 {
                        tracing::info!("[ModelBuilder::build] Written {} models...", outcome.num_written);
                    }
                }
                Err(e) => {
                    tracing::warn!(glyph = model.glyph(), "giving up writing the model: {e}");
                    outcome.defects.push(Defect {
                        glyph: model.glyph().to_string(),
                        kind: DefectKind::StoreUnavailable(e),
                    });
                }
            }
        }
        outcome
    }

    fn put_with_retry<S>(&self, store: &S, model: &GlyphModel) -> Result<(), StoreError>
    where
        S: ModelStore + ?Sized,
    {
        let mut backoff = self.retry_policy.initial_backoff;
        let mut attempt = 1;
        loop {
            match store.put_model(model) {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.retry_policy.max_attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        glyph = model.glyph(),
                        attempt,
                        "write failed, retrying in {backoff:?}: {e}"
                    );
                    thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Default)]
struct WriteOutcome {
    num_written: usize,
    num_unchanged: usize,
    defects: Vec<Defect>,
}

/// Shared state of one all-pairs scan. The per-glyph heaps are the only mutable part.
struct Scan<'a> {
    aligner: &'a Aligner,
    snapshot: &'a Snapshot,
    pending: &'a [bool],
    pending_list: Vec<usize>,
    heaps: Vec<Mutex<TopK>>,
    // Pairs each pending glyph still waits for.
    remaining: Vec<AtomicUsize>,
    fingerprint: &'a str,
    shows_progress: bool,
    num_rows: AtomicUsize,
    num_aligned: AtomicUsize,
    num_pruned: AtomicUsize,
}

impl Scan<'_> {
    /// Compares glyph `i` with every later glyph that needs the result.
    fn row(&self, i: usize, tx: &Sender<GlyphModel>) {
        let n = self.snapshot.len();
        if self.pending[i] {
            for j in i + 1..n {
                self.pair(i, j, tx);
            }
            let num_pairs = n - i - 1;
            if num_pairs > 0 && self.remaining[i].fetch_sub(num_pairs, Ordering::AcqRel) == num_pairs
            {
                self.finish(i, tx);
            }
        } else {
            let start = self.pending_list.partition_point(|&p| p <= i);
            for &j in &self.pending_list[start..] {
                self.pair(i, j, tx);
            }
        }

        if self.shows_progress {
            let done = self.num_rows.fetch_add(1, Ordering::Relaxed) + 1;
            if done % PROGRESS_INTERVAL == 0 {
                tracing::info!("[ModelBuilder::build] Processed {done}/{n} glyphs...");
            }
        }
    }

    fn pair(&self, i: usize, j: usize, tx: &Sender<GlyphModel>) {
        self.compare(i, j);
        if self.pending[j] && self.remaining[j].fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish(j, tx);
        }
    }

    fn compare(&self, i: usize, j: usize) {
        let bound = self.bound(i).max(self.bound(j));
        let a = &self.snapshot.strokes[i];
        let b = &self.snapshot.strokes[j];
        if self.aligner.lower_bound(a.len(), b.len()) > bound {
            self.num_pruned.fetch_add(1, Ordering::Relaxed);
            return;
        }
        match self.aligner.align_within(a, b, bound) {
            Some(score) => {
                self.num_aligned.fetch_add(1, Ordering::Relaxed);
                self.offer(i, Candidate { score, index: j });
                self.offer(j, Candidate { score, index: i });
            }
            None => {
                self.num_pruned.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn bound(&self, i: usize) -> f64 {
        if self.pending[i] {
            self.heap(i).bound()
        } else {
            f64::NEG_INFINITY
        }
    }

    fn offer(&self, i: usize, candidate: Candidate) {
        if self.pending[i] {
            self.heap(i).push(candidate);
        }
    }

    fn heap(&self, i: usize) -> MutexGuard<'_, TopK> {
        self.heaps[i].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Turns the heap of a glyph whose pairs are all done into a model for the writer.
    fn finish(&self, i: usize, tx: &Sender<GlyphModel>) {
        let heap = std::mem::replace(&mut *self.heap(i), TopK::new(0));
        tracing::debug!(glyph = %self.snapshot.ids[i], "#neighbors={}", heap.len());
        let neighbors = heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| NeighborEntry::new(&self.snapshot.ids[c.index], c.score))
            .collect();
        let model = GlyphModel::new(&self.snapshot.ids[i], neighbors, self.fingerprint);
        // The writer only hangs up by panicking, which the build re-raises.
        let _ = tx.send(model);
    }
}
