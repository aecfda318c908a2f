//// # Orthant probabilities
////
//// We want `log P(a <= X <= b)` for `X ~ N(center, C C^T)`, with `C` lower triangular.
//// The estimator integrates one dimension at a time. The first dimension contributes the
//// interval mass `e - d`, with `d` and `e` the CDF at the two bounds. Then, for each following
//// dimension `j`, a uniform deviate `w` picks a point inside the previous interval, which is
//// mapped back to the normal scale as `y = quantile(d + w (e - d))`. The transformed points of
//// all previous dimensions give the conditional location of dimension `j`, and therefore its
//// interval mass. The product of the `dim` interval masses is an unbiased estimate of the
//// probability; we average it over `M` replicates.

use crate::batch::*;
use crate::deviates::{Randomness, UniformSource};
use crate::stats::{CdfMethod, TruncatedQuantile};
use crate::types::{Instance, Problem, Settings};
use anyhow::Result;
use log::{debug, info};
use std::time::Instant;

/// Estimates the log-probability of every instance of `problem`.
///
/// The result holds one value per instance or, if `aggregate` is set, a single value with
/// the sum over all instances (the log-likelihood of the batch).
pub fn lpmvnorm(
    problem: &Problem<'_>,
    randomness: Randomness<'_>,
    settings: &Settings,
    aggregate: bool,
) -> Result<Vec<f64>> {
    let start = Instant::now();
    let dim = problem.dim();
    settings.validate(dim)?;
    info!(
        "lpmvnorm: n={} dim={} replicates={} tol={} cdf={:?} center={} randomness={:?}",
        problem.n(),
        dim,
        settings.replicates,
        settings.tol,
        settings.cdf,
        problem.has_center(),
        randomness
    );

    let replicates = settings.effective_replicates(dim);
    let kernel = LogProbability {
        replicates,
        log_replicates: if replicates == 0 {
            0.0
        } else {
            (replicates as f64).ln()
        },
        quantile: TruncatedQuantile::new(settings.tol),
        cdf: settings.cdf,
    };
    let logprobs = run_instances(problem, randomness, replicates, settings.parallel, &kernel)?;
    debug!("lpmvnorm done in {:?}", start.elapsed());

    if aggregate {
        Ok(vec![logprobs.iter().sum()])
    } else {
        Ok(logprobs)
    }
}

/// `log(sum)`, floored at `log(tol)`.
#[inline]
fn floored_log(sum: f64, tol: f64) -> f64 {
    if sum < tol {
        tol.ln()
    } else {
        sum.ln()
    }
}

struct LogProbability {
    replicates: usize,
    log_replicates: f64,
    quantile: TruncatedQuantile,
    cdf: CdfMethod,
}

impl InstanceKernel for LogProbability {
    type Output = f64;

    fn run<S: UniformSource>(&self, inst: &Instance<'_>, source: &mut S) -> f64 {
        let dim = inst.dim();
        let x0 = inst.initial_location();
        let d0 = self.cdf.cdf(inst.lower[0], x0);
        let e0 = self.cdf.cdf(inst.upper[0], x0);
        let emd0 = e0 - d0;

        // A single dimension needs no simulation
        let mut sum = if dim > 1 { 0.0 } else { emd0 };
        let mut y = vec![0.0; dim - 1];

        for _ in 0..self.replicates {
            let mut d = d0;
            let mut emd = emd0;
            let mut f = emd0;
            for j in 1..dim {
                let w = source.next_uniform();
                y[j - 1] = self.quantile.eval(d + w * emd);
                let x = inst.conditional_location(j, &y);
                d = self.cdf.cdf(inst.lower[j], x);
                let e = self.cdf.cdf(inst.upper[j], x);
                emd = e - d;
                f *= emd;
            }
            sum += f;
        }

        floored_log(sum, self.quantile.tol()) - self.log_replicates
    }
}
