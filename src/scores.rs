//// # Scores
////
//// This module differentiates the simulation of [crate::orthant] with respect to every
//// parameter of a problem: the entries of the Cholesky factor (diagonal included), the
//// center, and the lower and upper bounds. The replicates follow exactly the same path
//// as the probability estimator, consuming the same deviates in the same order, so that
//// values and gradients refer to the same simulated quantity.
////
//// Differentiation is forward mode, by hand. Every intermediate quantity of a replicate
//// (the CDF values `d` and `e` at the current dimension, the running product `f` and the
//// transformed deviates `y`) carries one tangent per parameter. The four parameter
//// families share the same update rules and are stored in four [Tangents]:
////
//// - when dimension `j` is reached, the parameters it introduces get their tangents directly
////   from the derivative of the CDF at the bounds;
//// - the parameters introduced earlier only act on dimension `j` through its location
////   `x = sum_k C[j, k] y[k]`, so their tangents follow from the chain rule,
////   `d' = -density(a_j, x) sum_k C[j, k] y'[k]`;
//// - the product rule gives `f' = (e' - d') f + (e - d) f'`;
//// - the tangent of `y = quantile(d + w (e - d))` follows from the implicit function rule,
////   `y' = (d' + w (e' - d')) / density(y)`.
////
//// The scores of a replicate are summed over replicates without any averaging or log
//// transformation: see [ScoreMatrix::log_gradient] to get the gradient of the log-probability.

use crate::batch::*;
use crate::deviates::{Randomness, UniformSource};
use crate::layout::{LowerTriangular, ScoreLayout};
use crate::stats::{density, inv_density, CdfMethod, TruncatedQuantile};
use crate::types::{Instance, Problem, Settings};
use anyhow::Result;
use log::{debug, info};
use std::ops::Range;
use std::time::Instant;

/// Computes the score matrix of every instance of `problem`.
pub fn slpmvnorm(
    problem: &Problem<'_>,
    randomness: Randomness<'_>,
    settings: &Settings,
) -> Result<ScoreMatrix> {
    let start = Instant::now();
    let dim = problem.dim();
    settings.validate(dim)?;
    info!(
        "slpmvnorm: n={} dim={} replicates={} tol={} cdf={:?} center={} randomness={:?}",
        problem.n(),
        dim,
        settings.replicates,
        settings.tol,
        settings.cdf,
        problem.has_center(),
        randomness
    );

    let replicates = settings.effective_replicates(dim);
    let kernel = Scores {
        replicates,
        quantile: TruncatedQuantile::new(settings.tol),
        cdf: settings.cdf,
        layout: ScoreLayout::new(dim),
        packed: LowerTriangular::with_diagonal(dim),
    };
    let columns = run_instances(problem, randomness, replicates, settings.parallel, &kernel)?;
    debug!("slpmvnorm done in {:?}", start.elapsed());

    let layout = kernel.layout;
    let mut data = Vec::with_capacity(layout.rows() * problem.n());
    for column in columns {
        data.extend_from_slice(&column);
    }
    Ok(ScoreMatrix {
        layout,
        n: problem.n(),
        data,
    })
}

/// Scores of a batch, one column per instance, stored column-major.
///
/// Each column holds `[sum f, cholesky scores, mean scores, lower scores, upper scores]`,
/// where the sums run over the replicates and the cholesky scores follow the row-wise
/// packed layout of a lower triangular matrix with its diagonal.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreMatrix {
    layout: ScoreLayout,
    n: usize,
    data: Vec<f64>,
}

impl ScoreMatrix {
    pub fn nrows(&self) -> usize {
        self.layout.rows()
    }

    pub fn ncols(&self) -> usize {
        self.n
    }

    pub fn layout(&self) -> ScoreLayout {
        self.layout
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn column(&self, i: usize) -> &[f64] {
        let rows = self.nrows();
        &self.data[i * rows..(i + 1) * rows]
    }

    /// Sum over the replicates of the simulated probability.
    pub fn probability_sum(&self, i: usize) -> f64 {
        self.column(i)[ScoreLayout::PROBABILITY]
    }

    pub fn chol(&self, i: usize) -> &[f64] {
        &self.column(i)[self.layout.chol()]
    }

    pub fn mean(&self, i: usize) -> &[f64] {
        &self.column(i)[self.layout.mean()]
    }

    pub fn lower(&self, i: usize) -> &[f64] {
        &self.column(i)[self.layout.lower()]
    }

    pub fn upper(&self, i: usize) -> &[f64] {
        &self.column(i)[self.layout.upper()]
    }

    /// Gradient of the log of the simulated probability of instance `i`, in the same
    /// layout as the column without its first row.
    pub fn log_gradient(&self, i: usize) -> Vec<f64> {
        let column = self.column(i);
        let sum = column[ScoreLayout::PROBABILITY];
        column[1..].iter().map(|s| s / sum).collect()
    }
}

/// Tangents of `d`, `e`, `f` and of the transformed deviates with respect to one family
/// of parameters.
struct Tangents {
    d: Vec<f64>,
    e: Vec<f64>,
    f: Vec<f64>,
    /// `y[p * steps + k]` is the tangent of the deviate of step `k` wrt parameter `p`.
    y: Vec<f64>,
    steps: usize,
}

impl Tangents {
    fn new(params: usize, steps: usize) -> Self {
        Self {
            d: vec![0.0; params],
            e: vec![0.0; params],
            f: vec![0.0; params],
            y: vec![0.0; params * steps],
            steps,
        }
    }

    fn params(&self) -> usize {
        self.f.len()
    }

    /// Sets the tangents of a parameter entering at the current dimension.
    #[inline]
    fn introduce(&mut self, p: usize, d: f64, e: f64, f: f64) {
        self.d[p] = d;
        self.e[p] = e;
        self.f[p] = f;
    }

    /// Tangents of the deviate transformed at step `k`, for the first `active` parameters;
    /// the others do not influence it yet.
    #[inline]
    fn transform_deviate(&mut self, k: usize, active: usize, w: f64, inv_dens: f64) {
        for p in 0..self.params() {
            self.y[p * self.steps + k] = if p < active {
                inv_dens * (self.d[p] + w * (self.e[p] - self.d[p]))
            } else {
                0.0
            };
        }
    }

    /// Chain rule through the location of dimension `j`, whose row of the Cholesky factor
    /// is `row`, for the parameters in `params`. `f` is the running product before
    /// dimension `j` and `emd` the interval mass of dimension `j`.
    #[inline]
    fn propagate(
        &mut self,
        params: Range<usize>,
        row: &[f64],
        dens_lower: f64,
        dens_upper: f64,
        f: f64,
        emd: f64,
    ) {
        let j = row.len();
        for p in params {
            let yp = &self.y[p * self.steps..p * self.steps + j];
            let mut dx = 0.0;
            for (c, t) in row.iter().zip(yp) {
                dx += c * t;
            }
            self.d[p] = -dens_lower * dx;
            self.e[p] = -dens_upper * dx;
            self.f[p] = (self.e[p] - self.d[p]) * f + emd * self.f[p];
        }
    }

    fn accumulate(&self, out: &mut [f64]) {
        for (o, fp) in out.iter_mut().zip(&self.f) {
            *o += fp;
        }
    }

    fn write(&self, out: &mut [f64]) {
        out.copy_from_slice(&self.f);
    }
}

/// Per-replicate state of the score computation.
struct ScoreState {
    chol: Tangents,
    mean: Tangents,
    lower: Tangents,
    upper: Tangents,
    y: Vec<f64>,
}

impl ScoreState {
    fn new(dim: usize, packed: usize) -> Self {
        let steps = dim - 1;
        Self {
            chol: Tangents::new(packed, steps),
            mean: Tangents::new(dim, steps),
            lower: Tangents::new(dim, steps),
            upper: Tangents::new(dim, steps),
            y: vec![0.0; steps],
        }
    }

    /// Tangents of the first dimension, whose location is `x0`.
    fn reset(&mut self, inst: &Instance<'_>, x0: f64) {
        let (a, b) = (inst.lower[0], inst.upper[0]);
        let c0 = inst.center(0);
        let dens_a = finite_density(a, x0);
        let dens_b = finite_density(b, x0);
        let dc = if a.is_finite() { dens_a * (a - x0 - c0) } else { 0.0 };
        let ec = if b.is_finite() { dens_b * (b - x0 - c0) } else { 0.0 };
        self.chol.introduce(0, dc, ec, ec - dc);
        self.mean.introduce(0, dens_a, dens_b, dens_b - dens_a);
        self.lower.introduce(0, dens_a, 0.0, -dens_a);
        self.upper.introduce(0, 0.0, dens_b, dens_b);
    }

    fn accumulate(&self, f: f64, layout: &ScoreLayout, out: &mut [f64]) {
        out[ScoreLayout::PROBABILITY] += f;
        self.chol.accumulate(&mut out[layout.chol()]);
        self.mean.accumulate(&mut out[layout.mean()]);
        self.lower.accumulate(&mut out[layout.lower()]);
        self.upper.accumulate(&mut out[layout.upper()]);
    }
}

/// Density at a bound, zero when the bound is infinite.
#[inline]
fn finite_density(bound: f64, x: f64) -> f64 {
    if bound.is_finite() {
        density(bound, x)
    } else {
        0.0
    }
}

struct Scores {
    replicates: usize,
    quantile: TruncatedQuantile,
    cdf: CdfMethod,
    layout: ScoreLayout,
    packed: LowerTriangular,
}

impl InstanceKernel for Scores {
    type Output = Vec<f64>;

    fn run<S: UniformSource>(&self, inst: &Instance<'_>, source: &mut S) -> Vec<f64> {
        let dim = inst.dim();
        let mut out = vec![0.0; self.layout.rows()];
        let mut state = ScoreState::new(dim, self.packed.len());

        let x0 = inst.initial_location();
        let d0 = self.cdf.cdf(inst.lower[0], x0);
        let e0 = self.cdf.cdf(inst.upper[0], x0);
        let emd0 = e0 - d0;

        if self.replicates == 0 {
            // univariate: the scores of the first dimension are final
            state.reset(inst, x0);
            out[ScoreLayout::PROBABILITY] = emd0;
            state.chol.write(&mut out[self.layout.chol()]);
            state.mean.write(&mut out[self.layout.mean()]);
            state.lower.write(&mut out[self.layout.lower()]);
            state.upper.write(&mut out[self.layout.upper()]);
            return out;
        }

        for _ in 0..self.replicates {
            let mut d = d0;
            let mut emd = emd0;
            let mut f = emd0;
            state.reset(inst, x0);

            for j in 1..dim {
                let w = source.next_uniform();
                let y = self.quantile.eval(d + w * emd);
                state.y[j - 1] = y;
                let x = inst.conditional_location(j, &state.y);

                let (a, b) = (inst.lower[j], inst.upper[j]);
                d = self.cdf.cdf(a, x);
                let e = self.cdf.cdf(b, x);
                emd = e - d;

                // deviate tangents, from the tangents of the previous dimension
                let inv_dens = inv_density(y);
                let known = self.packed.len_upto(j);
                state.chol.transform_deviate(j - 1, known, w, inv_dens);
                state.mean.transform_deviate(j - 1, j, w, inv_dens);
                state.lower.transform_deviate(j - 1, j, w, inv_dens);
                state.upper.transform_deviate(j - 1, j, w, inv_dens);

                let dens_a = density(a, x);
                let dens_b = density(b, x);

                // new off-diagonal entries of the Cholesky factor
                for k in 0..j {
                    let dx = state.y[k] - inst.center(k);
                    let dp = -dens_a * dx;
                    let ep = -dens_b * dx;
                    state
                        .chol
                        .introduce(self.packed.index(j, k), dp, ep, (ep - dp) * f);
                }

                // new diagonal entry
                let cj = inst.center(j);
                let dp = if a.is_finite() { dens_a * (a - x - cj) } else { 0.0 };
                let ep = if b.is_finite() { dens_b * (b - x - cj) } else { 0.0 };
                state
                    .chol
                    .introduce(self.packed.diagonal(j), dp, ep, (ep - dp) * f);

                // new mean, lower and upper entries
                let dens_a = if a.is_finite() { dens_a } else { 0.0 };
                let dens_b = if b.is_finite() { dens_b } else { 0.0 };
                let fl = -dens_a * f;
                let fu = dens_b * f;
                state.mean.introduce(j, dens_a, dens_b, fu + fl);
                state.lower.introduce(j, dens_a, 0.0, fl);
                state.upper.introduce(j, 0.0, dens_b, fu);

                // parameters of the previous dimensions
                let row = inst.chol_row(j);
                state.chol.propagate(0..known, row, dens_a, dens_b, f, emd);
                state.mean.propagate(0..j, row, dens_a, dens_b, f, emd);
                state.lower.propagate(0..j, row, dens_a, dens_b, f, emd);
                state.upper.propagate(0..j, row, dens_a, dens_b, f, emd);

                f *= emd;
            }

            state.accumulate(f, &self.layout, &mut out);
        }
        out
    }
}
