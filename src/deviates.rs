//// # Uniform deviates
////
//// Each replicate of each instance consumes `dim - 1` uniform deviates, one per conditioning
//// step. They can be supplied by the caller (which makes the estimators deterministic,
//// and allows quasi-Monte-Carlo point sets) or drawn from a pseudo-random stream.
//// The estimators only see the [UniformSource] trait.

use anyhow::{ensure, Result};
use rand::prelude::*;
use rand_distr::Uniform;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Strategy producing the next uniform deviate of the simulation.
pub trait UniformSource {
    fn next_uniform(&mut self) -> f64;
}

/// Where the deviates of a call come from.
pub enum Randomness<'a> {
    /// Caller supplied deviates, either `(dim - 1) * M` values shared by all instances,
    /// or `(dim - 1) * n * M` values, one block per instance.
    Weights(&'a [f64]),
    /// A single stream shared by all instances, consumed sequentially in instance order.
    Stream(&'a mut dyn RngCore),
    /// Independent streams for each instance, all derived from one seed.
    Seeded(u64),
}

impl<'a> std::fmt::Debug for Randomness<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weights(w) => write!(f, "Weights(len={})", w.len()),
            Self::Stream(_) => write!(f, "Stream"),
            Self::Seeded(seed) => write!(f, "Seeded({})", seed),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightLayout {
    Shared,
    PerInstance,
}

/// Validated view over caller supplied deviates.
#[derive(Clone, Copy, Debug)]
pub struct Weights<'a> {
    data: &'a [f64],
    layout: WeightLayout,
    block: usize,
}

impl<'a> Weights<'a> {
    pub fn new(data: &'a [f64], n: usize, dim: usize, replicates: usize) -> Result<Self> {
        let block = (dim - 1) * replicates;
        let layout = if data.len() == block {
            WeightLayout::Shared
        } else {
            ensure!(
                data.len() == block * n,
                "Length of W incorrect: expected {} (shared) or {} (per instance), got {}",
                block,
                block * n,
                data.len()
            );
            WeightLayout::PerInstance
        };
        Ok(Self {
            data,
            layout,
            block,
        })
    }

    pub fn layout(&self) -> WeightLayout {
        self.layout
    }

    /// The deviates consumed by instance `i`, in consumption order.
    pub fn instance(&self, i: usize) -> &'a [f64] {
        match self.layout {
            WeightLayout::Shared => self.data,
            WeightLayout::PerInstance => &self.data[i * self.block..(i + 1) * self.block],
        }
    }

    pub fn cursor(&self, i: usize) -> WeightCursor<'a> {
        WeightCursor {
            data: self.instance(i),
            pos: 0,
        }
    }
}

/// Reads supplied deviates in order.
#[derive(Debug)]
pub struct WeightCursor<'a> {
    data: &'a [f64],
    pos: usize,
}

impl<'a> UniformSource for WeightCursor<'a> {
    #[inline]
    fn next_uniform(&mut self) -> f64 {
        let w = self.data[self.pos];
        self.pos += 1;
        w
    }
}

/// Draws deviates uniformly in `[0, 1)` from a random number generator.
pub struct RngSource<R> {
    rng: R,
    unif: Uniform<f64>,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            unif: Uniform::new(0.0, 1.0),
        }
    }
}

impl<R: Rng> UniformSource for RngSource<R> {
    #[inline]
    fn next_uniform(&mut self) -> f64 {
        self.rng.sample(self.unif)
    }
}

/// The `n` per-instance generators for [Randomness::Seeded]: instance `i` uses the
/// generator seeded with `seed` advanced by `i` jumps of `2^128` steps.
pub fn instance_streams(seed: u64, n: usize) -> Vec<Xoshiro256PlusPlus> {
    let mut base = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut streams = Vec::with_capacity(n);
    for _ in 0..n {
        streams.push(base.clone());
        base.jump();
    }
    streams
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_weight_layouts() {
        let data: Vec<f64> = (0..12).map(|i| i as f64 / 12.0).collect();
        // dim 3, 2 replicates, 3 instances
        let w = Weights::new(&data, 3, 3, 2).unwrap();
        assert_eq!(w.layout(), WeightLayout::PerInstance);
        assert_eq!(w.instance(1), &data[4..8]);

        let w = Weights::new(&data[..4], 3, 3, 2).unwrap();
        assert_eq!(w.layout(), WeightLayout::Shared);
        assert_eq!(w.instance(2), &data[..4]);

        let mut cursor = w.cursor(2);
        let drawn: Vec<f64> = (0..4).map(|_| cursor.next_uniform()).collect();
        assert_eq!(drawn, &data[..4]);

        let err = Weights::new(&data[..5], 3, 3, 2).unwrap_err();
        assert!(err.to_string().contains("Length of W"));
    }

    #[test]
    fn test_rng_source_in_unit_interval() {
        let mut source = RngSource::new(Xoshiro256PlusPlus::seed_from_u64(1234));
        for _ in 0..10000 {
            let u = source.next_uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_rng_source_over_borrowed_stream() {
        let mut owned = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut borrowed = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut a = RngSource::new(&mut owned);
        let dynrng: &mut dyn RngCore = &mut borrowed;
        let mut b = RngSource::new(dynrng);
        for _ in 0..100 {
            assert_eq!(a.next_uniform(), b.next_uniform());
        }
    }

    #[test]
    fn test_instance_streams_are_distinct_and_reproducible() {
        let a = instance_streams(99, 4);
        let b = instance_streams(99, 4);
        assert_eq!(a, b);
        let firsts: Vec<u64> = a.into_iter().map(|mut rng| rng.next_u64()).collect();
        for i in 0..firsts.len() {
            for j in 0..i {
                assert_ne!(firsts[i], firsts[j]);
            }
        }
    }
}
