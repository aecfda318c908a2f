use super::quantile;

/// Standard normal quantile function clamped away from 0 and 1.
///
/// Probabilities below `tol` map to `q0 = quantile(tol)`, probabilities above `1 - tol`
/// map to `-q0`, everything else to the exact quantile.
#[derive(Clone, Copy, Debug)]
pub struct TruncatedQuantile {
    tol: f64,
    upper: f64,
    q0: f64,
}

impl TruncatedQuantile {
    pub fn new(tol: f64) -> Self {
        debug_assert!(tol > 0.0 && tol < 1.0);
        Self {
            tol,
            upper: 1.0 - tol,
            q0: quantile(tol),
        }
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// The boundary value returned for probabilities below the tolerance.
    pub fn boundary(&self) -> f64 {
        self.q0
    }

    #[inline]
    pub fn eval(&self, p: f64) -> f64 {
        if p < self.tol {
            self.q0
        } else if p > self.upper {
            -self.q0
        } else {
            quantile(p)
        }
    }
}
