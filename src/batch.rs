//// # Running a batch of instances
////
//// Both estimators process the `n` instances independently, each consuming its own
//// deviates. This module resolves the [Randomness] once, before the instance loop, and
//// dispatches every instance to an [InstanceKernel], either sequentially or on the rayon
//// thread pool. A stream shared by all instances cannot be consumed concurrently without
//// changing the results, so it always runs sequentially.

use crate::deviates::*;
use crate::types::{Instance, Problem};
use anyhow::Result;
use log::{debug, trace};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

/// The per-instance part of an estimator.
pub(crate) trait InstanceKernel: Sync {
    type Output: Send;

    fn run<S: UniformSource>(&self, instance: &Instance<'_>, source: &mut S) -> Self::Output;
}

pub(crate) fn run_instances<K: InstanceKernel>(
    problem: &Problem<'_>,
    randomness: Randomness<'_>,
    replicates: usize,
    parallel: bool,
    kernel: &K,
) -> Result<Vec<K::Output>> {
    let n = problem.n();
    let outputs = match randomness {
        Randomness::Weights(data) => {
            let weights = Weights::new(data, n, problem.dim(), replicates)?;
            debug!("Using supplied deviates, layout {:?}", weights.layout());
            let task = |i: usize| {
                trace!("instance {}", i);
                let mut cursor = weights.cursor(i);
                kernel.run(&problem.instance(i), &mut cursor)
            };
            if parallel {
                (0..n).into_par_iter().map(task).collect()
            } else {
                (0..n).map(task).collect()
            }
        }
        Randomness::Seeded(seed) => {
            debug!("Using per-instance streams from seed {}", seed);
            let streams = instance_streams(seed, n);
            let task = |(i, rng): (usize, Xoshiro256PlusPlus)| {
                trace!("instance {}", i);
                let mut source = RngSource::new(rng);
                kernel.run(&problem.instance(i), &mut source)
            };
            if parallel {
                streams.into_par_iter().enumerate().map(task).collect()
            } else {
                streams.into_iter().enumerate().map(task).collect()
            }
        }
        Randomness::Stream(rng) => {
            if parallel {
                debug!("A shared stream is consumed sequentially, ignoring the parallel flag");
            }
            let mut source = RngSource::new(rng);
            (0..n)
                .map(|i| {
                    trace!("instance {}", i);
                    kernel.run(&problem.instance(i), &mut source)
                })
                .collect()
        }
    };
    Ok(outputs)
}
