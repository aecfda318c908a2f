use crate::layout::LowerTriangular;
use crate::stats::CdfMethod;
use anyhow::{ensure, Result};

/// Strictly lower triangular Cholesky factors, either one for all instances or one per instance.
#[derive(Clone, Copy, Debug)]
pub enum Cholesky<'a> {
    Shared(&'a [f64]),
    PerInstance(&'a [f64]),
}

impl<'a> Cholesky<'a> {
    /// Decides the variant from the length of the flat buffer.
    pub fn resolve(data: &'a [f64], n: usize, dim: usize) -> Result<Self> {
        let packed = LowerTriangular::unit(dim).len();
        if data.len() == packed {
            Ok(Self::Shared(data))
        } else {
            ensure!(
                data.len() == n * packed,
                "incorrect length of the Cholesky factor: expected {} (shared) or {} (per instance), got {}",
                packed,
                n * packed,
                data.len()
            );
            Ok(Self::PerInstance(data))
        }
    }

    fn get(&self, i: usize, packed: usize) -> &'a [f64] {
        match self {
            Self::Shared(data) => data,
            Self::PerInstance(data) => &data[i * packed..(i + 1) * packed],
        }
    }
}

/// Mean vectors; [Center::Zero] when the caller supplies none.
#[derive(Clone, Copy, Debug)]
pub enum Center<'a> {
    Zero,
    PerInstance(&'a [f64]),
}

impl<'a> Center<'a> {
    /// An empty buffer means "no centering".
    pub fn resolve(data: &'a [f64], n: usize, dim: usize) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::Zero);
        }
        ensure!(
            data.len() == n * dim,
            "incorrect dimensions of center: expected {}, got {}",
            n * dim,
            data.len()
        );
        Ok(Self::PerInstance(data))
    }
}

/// A batch of `n` orthant probability problems in dimension `dim`,
/// backed by flat row-major buffers.
#[derive(Clone, Copy, Debug)]
pub struct Problem<'a> {
    lower: &'a [f64],
    upper: &'a [f64],
    chol: Cholesky<'a>,
    center: Center<'a>,
    n: usize,
    dim: usize,
}

impl<'a> Problem<'a> {
    pub fn new(
        lower: &'a [f64],
        upper: &'a [f64],
        chol: &'a [f64],
        center: &'a [f64],
        n: usize,
        dim: usize,
    ) -> Result<Self> {
        ensure!(dim > 0, "the dimension must be positive");
        ensure!(
            lower.len() == n * dim,
            "incorrect length of the lower bounds: expected {}, got {}",
            n * dim,
            lower.len()
        );
        ensure!(
            upper.len() == n * dim,
            "incorrect length of the upper bounds: expected {}, got {}",
            n * dim,
            upper.len()
        );
        let chol = Cholesky::resolve(chol, n, dim)?;
        let center = Center::resolve(center, n, dim)?;
        Ok(Self {
            lower,
            upper,
            chol,
            center,
            n,
            dim,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn has_center(&self) -> bool {
        matches!(self.center, Center::PerInstance(_))
    }

    /// Read-only view of instance `i`.
    pub fn instance(&self, i: usize) -> Instance<'a> {
        assert!(i < self.n);
        let rows = i * self.dim..(i + 1) * self.dim;
        let tri = LowerTriangular::unit(self.dim);
        Instance {
            lower: &self.lower[rows.clone()],
            upper: &self.upper[rows.clone()],
            chol: self.chol.get(i, tri.len()),
            center: match self.center {
                Center::Zero => None,
                Center::PerInstance(data) => Some(&data[rows]),
            },
            tri,
        }
    }
}

/// The bounds, Cholesky factor and (optional) center of a single problem.
#[derive(Clone, Copy, Debug)]
pub struct Instance<'a> {
    pub lower: &'a [f64],
    pub upper: &'a [f64],
    pub chol: &'a [f64],
    pub center: Option<&'a [f64]>,
    tri: LowerTriangular,
}

impl<'a> Instance<'a> {
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    #[inline]
    pub fn center(&self, k: usize) -> f64 {
        self.center.map_or(0.0, |c| c[k])
    }

    /// Location of the first dimension.
    #[inline]
    pub fn initial_location(&self) -> f64 {
        -self.center(0)
    }

    /// Off-diagonal entries of row `j` of the Cholesky factor.
    #[inline]
    pub fn chol_row(&self, j: usize) -> &'a [f64] {
        &self.chol[self.tri.row(j)]
    }

    /// Location of dimension `j >= 1`, conditional on the transformed deviates `y[..j]`
    /// of the previous dimensions.
    #[inline]
    pub fn conditional_location(&self, j: usize, y: &[f64]) -> f64 {
        let row = self.chol_row(j);
        match self.center {
            None => {
                let mut x = 0.0;
                for (c, yk) in row.iter().zip(&y[..j]) {
                    x += c * yk;
                }
                x
            }
            Some(center) => {
                let mut x = 0.0;
                for ((c, yk), mk) in row.iter().zip(&y[..j]).zip(center) {
                    x += c * (yk - mk);
                }
                x - center[j]
            }
        }
    }
}

/// Tuning of the simulation.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    /// Number of simulation replicates `M` per instance.
    pub replicates: usize,
    /// Clamp boundary of the quantile function and floor of the estimated probability.
    pub tol: f64,
    pub cdf: CdfMethod,
    /// Process instances on the rayon thread pool, when the randomness allows it.
    pub parallel: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            replicates: 10_000,
            tol: f64::EPSILON,
            cdf: CdfMethod::Exact,
            parallel: false,
        }
    }
}

impl Settings {
    pub fn validate(&self, dim: usize) -> Result<()> {
        ensure!(
            self.tol > 0.0 && self.tol < 1.0,
            "the tolerance must be in (0, 1), got {}",
            self.tol
        );
        ensure!(
            dim == 1 || self.replicates > 0,
            "at least one replicate is needed in dimension {}",
            dim
        );
        Ok(())
    }

    /// Replicates actually simulated: univariate problems need no simulation at all.
    pub fn effective_replicates(&self, dim: usize) -> usize {
        if dim == 1 {
            0
        } else {
            self.replicates
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_shared_and_per_instance_cholesky() {
        let lower = [0.0; 6];
        let upper = [1.0; 6];
        let shared = [0.1, 0.2, 0.3];
        let problem = Problem::new(&lower, &upper, &shared, &[], 2, 3).unwrap();
        assert_eq!(problem.instance(0).chol, &shared);
        assert_eq!(problem.instance(1).chol, &shared);

        let per_instance = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let problem = Problem::new(&lower, &upper, &per_instance, &[], 2, 3).unwrap();
        assert_eq!(problem.instance(0).chol, &per_instance[..3]);
        assert_eq!(problem.instance(1).chol, &per_instance[3..]);
        assert_eq!(problem.instance(1).chol_row(2), &[0.5, 0.6]);
        assert!(problem.instance(1).center.is_none());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let lower = [0.0; 6];
        let upper = [1.0; 6];
        let chol = [0.1, 0.2, 0.3];
        assert!(Problem::new(&lower, &upper, &chol[..2], &[], 2, 3).is_err());
        assert!(Problem::new(&lower, &upper[..5], &chol, &[], 2, 3).is_err());
        assert!(Problem::new(&lower, &upper, &chol, &[0.0; 5], 2, 3).is_err());
        assert!(Problem::new(&[], &[], &[], &[], 1, 0).is_err());
        let err = Problem::new(&lower, &upper, &chol, &[0.0; 4], 2, 3).unwrap_err();
        assert!(err.to_string().contains("center"));
    }

    #[test]
    fn test_conditional_location() {
        let lower = [0.0; 3];
        let upper = [1.0; 3];
        let chol = [0.5, -1.0, 2.0];
        let y = [0.3, -0.7];
        let problem = Problem::new(&lower, &upper, &chol, &[], 1, 3).unwrap();
        let inst = problem.instance(0);
        assert_eq!(inst.initial_location(), 0.0);
        assert_eq!(inst.conditional_location(1, &y), 0.5 * 0.3);
        assert_eq!(inst.conditional_location(2, &y), -1.0 * 0.3 + 2.0 * -0.7);

        let center = [0.1, 0.2, 0.4];
        let problem = Problem::new(&lower, &upper, &chol, &center, 1, 3).unwrap();
        let inst = problem.instance(0);
        assert_eq!(inst.initial_location(), -0.1);
        let expected = -1.0 * (0.3 - 0.1) + 2.0 * (-0.7 - 0.2) - 0.4;
        assert!((inst.conditional_location(2, &y) - expected).abs() < 1e-15);
    }

    #[test]
    fn test_settings_validation() {
        let settings = Settings {
            tol: 0.0,
            ..Default::default()
        };
        assert!(settings.validate(2).is_err());
        let settings = Settings {
            replicates: 0,
            ..Default::default()
        };
        assert!(settings.validate(2).is_err());
        assert!(settings.validate(1).is_ok());
        assert_eq!(Settings::default().effective_replicates(1), 0);
    }
}
