use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orthant::layout::LowerTriangular;
use orthant::{lpmvnorm, slpmvnorm, CdfMethod, Problem, Randomness, Settings};

struct Batch {
    lower: Vec<f64>,
    upper: Vec<f64>,
    chol: Vec<f64>,
    n: usize,
    dim: usize,
}

fn gen_batch(n: usize, dim: usize, seed: u64) -> Batch {
    use rand::prelude::*;
    use rand_distr::{StandardNormal, Uniform};
    use rand_xoshiro::Xoroshiro128Plus;

    let mut rng = Xoroshiro128Plus::seed_from_u64(seed);
    let lower: Vec<f64> = (0..n * dim).map(|_| rng.sample(Uniform::new(-2.0, 0.0))).collect();
    let upper: Vec<f64> = lower
        .iter()
        .map(|a| a + rng.sample(Uniform::new(0.5, 3.0)))
        .collect();
    let chol: Vec<f64> = (&mut rng)
        .sample_iter(StandardNormal)
        .take(n * LowerTriangular::unit(dim).len())
        .map(|c: f64| 0.3 * c)
        .collect();
    Batch {
        lower,
        upper,
        chol,
        n,
        dim,
    }
}

pub fn bench_lpmvnorm(c: &mut Criterion) {
    let mut group = c.benchmark_group("lpmvnorm");
    group.sample_size(10);
    for dim in [3, 5, 10] {
        let batch = gen_batch(100, dim, 12344);
        let problem = Problem::new(&batch.lower, &batch.upper, &batch.chol, &[], batch.n, batch.dim)
            .unwrap();
        for cdf in [CdfMethod::Exact, CdfMethod::Fast] {
            let settings = Settings {
                replicates: 1000,
                cdf,
                ..Default::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", cdf), dim),
                &dim,
                |b, _| {
                    b.iter(|| {
                        lpmvnorm(&problem, Randomness::Seeded(12345), black_box(&settings), false)
                            .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

pub fn bench_slpmvnorm(c: &mut Criterion) {
    let mut group = c.benchmark_group("slpmvnorm");
    group.sample_size(10);
    for dim in [3, 5, 10] {
        let batch = gen_batch(100, dim, 12344);
        let problem = Problem::new(&batch.lower, &batch.upper, &batch.chol, &[], batch.n, batch.dim)
            .unwrap();
        for cdf in [CdfMethod::Exact, CdfMethod::Fast] {
            let settings = Settings {
                replicates: 1000,
                cdf,
                ..Default::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", cdf), dim),
                &dim,
                |b, _| {
                    b.iter(|| {
                        slpmvnorm(&problem, Randomness::Seeded(12345), black_box(&settings))
                            .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

pub fn bench_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel");
    group.sample_size(10);
    let batch = gen_batch(1000, 5, 12344);
    let problem =
        Problem::new(&batch.lower, &batch.upper, &batch.chol, &[], batch.n, batch.dim).unwrap();
    for parallel in [false, true] {
        let settings = Settings {
            replicates: 1000,
            parallel,
            ..Default::default()
        };
        group.bench_function(format!("lpmvnorm parallel={}", parallel), |b| {
            b.iter(|| lpmvnorm(&problem, Randomness::Seeded(12345), &settings, true).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lpmvnorm, bench_slpmvnorm, bench_parallel);
criterion_main!(benches);
