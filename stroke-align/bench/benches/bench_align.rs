use std::sync::Arc;
use std::time::Duration;

use rand::{thread_rng, Rng};

use criterion::{
    criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, Criterion, SamplingMode,
};

use stroke_align::{Aligner, StrokeCategory, Taxonomy};

const SAMPLE_SIZE: usize = 10;
const WARM_UP_TIME: Duration = Duration::from_secs(5);
const MEASURE_TIME: Duration = Duration::from_secs(10);

const NUM_SEQUENCES: usize = 1000;
const LENGTHS: [usize; 4] = [4, 8, 16, 32];
const BOUNDS: [f64; 3] = [0.1, 0.3, 0.5];

fn criterion_uniform(c: &mut Criterion) {
    let mut group = c.benchmark_group("uniform");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP_TIME);
    group.measurement_time(MEASURE_TIME);
    group.sampling_mode(SamplingMode::Flat);

    let taxonomy = Arc::new(Taxonomy::cjk());
    let categories: Vec<StrokeCategory> = taxonomy.categories().collect();
    let mut rng = thread_rng();
    let mut sequences = Vec::with_capacity(LENGTHS.len());
    for &len in &LENGTHS {
        let mut seqs = Vec::with_capacity(NUM_SEQUENCES);
        for _ in 0..NUM_SEQUENCES {
            let len = rng.gen_range(len / 2..=len);
            let seq: Vec<_> = (0..len)
                .map(|_| categories[rng.gen_range(0..categories.len())])
                .collect();
            seqs.push(seq);
        }
        sequences.push(seqs);
    }

    add_align_benches(&mut group, &Aligner::new(taxonomy), &sequences);
}

fn add_align_benches(
    group: &mut BenchmarkGroup<WallTime>,
    aligner: &Aligner,
    sequences: &[Vec<Vec<StrokeCategory>>],
) {
    for (&len, seqs) in LENGTHS.iter().zip(sequences) {
        group.bench_function(format!("align/{len}"), |b| {
            b.iter(|| {
                let mut total = 0.;
                for pair in seqs.windows(2) {
                    total += aligner.align(&pair[0], &pair[1]);
                }
                if total < 0. {
                    panic!();
                }
            });
        });
        for &bound in &BOUNDS {
            group.bench_function(format!("align_within/{len}/{bound}"), |b| {
                b.iter(|| {
                    let mut hits = 0;
                    for pair in seqs.windows(2) {
                        if aligner.align_within(&pair[0], &pair[1], bound).is_some() {
                            hits += 1;
                        }
                    }
                    if hits == usize::MAX {
                        panic!();
                    }
                });
            });
        }
    }
}

criterion_group!(benches, criterion_uniform);
criterion_main!(benches);
