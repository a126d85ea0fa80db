//! Natural cubic spline interpolation.
//!
//! Used in two places: smoothing tabulated optical constants between data
//! wavelengths, and building a continuous reflectance curve $R(\theta)$ so the
//! resonance minimum can be located below the sampling resolution of the
//! angle grid.

use thiserror::Error;

/// Reasons a set of knots cannot define a spline.
#[derive(Debug, Error, PartialEq)]
pub enum SplineError {
    #[error("xs ({xs}) and ys ({ys}) must have equal length")]
    LengthMismatch { xs: usize, ys: usize },

    #[error("Need at least 2 data points, got {0}")]
    TooFewPoints(usize),

    #[error("xs must be strictly increasing at index {0}")]
    NotIncreasing(usize),

    #[error("Non-finite knot value at index {0}")]
    NonFinite(usize),
}

/// A natural cubic spline interpolator for real-valued data.
///
/// Given $n$ data points $(x_i, y_i)$, constructs piecewise cubic polynomials
/// with continuous first and second derivatives and zero curvature at both ends.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    /// Sorted x values (knots).
    xs: Vec<f64>,
    /// Corresponding y values.
    ys: Vec<f64>,
    /// Second derivatives at each knot (computed during construction).
    y2s: Vec<f64>,
}

impl CubicSpline {
    /// Construct a natural cubic spline from data points.
    ///
    /// # Panics
    /// Panics on invalid knots. Use [`CubicSpline::try_new`] when the data
    /// comes from a computation that may produce duplicates or non-finite values.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        match Self::try_new(xs, ys) {
            Ok(spline) => spline,
            Err(e) => panic!("Invalid spline knots: {e}"),
        }
    }

    /// Construct a natural cubic spline, rejecting invalid knots.
    ///
    /// # Arguments
    /// * `xs` - Strictly increasing, finite x values.
    /// * `ys` - Corresponding finite y values (same length as `xs`).
    pub fn try_new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, SplineError> {
        if xs.len() != ys.len() {
            return Err(SplineError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        if xs.len() < 2 {
            return Err(SplineError::TooFewPoints(xs.len()));
        }
        if let Some(i) = (0..xs.len()).find(|&i| !xs[i].is_finite() || !ys[i].is_finite()) {
            return Err(SplineError::NonFinite(i));
        }
        if let Some(i) = (1..xs.len()).find(|&i| xs[i] <= xs[i - 1]) {
            return Err(SplineError::NotIncreasing(i));
        }

        let n = xs.len();
        let mut y2s = vec![0.0; n];
        let mut u = vec![0.0; n - 1];

        // Forward sweep (tridiagonal system for natural spline)
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let p = sig * y2s[i - 1] + 2.0;
            y2s[i] = (sig - 1.0) / p;
            u[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
                - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            u[i] = (6.0 * u[i] / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
        }

        // Back substitution
        for k in (0..n - 2).rev() {
            y2s[k + 1] = y2s[k + 1] * y2s[k + 2] + u[k + 1];
        }

        Ok(Self { xs, ys, y2s })
    }

    /// Knot domain `(x_first, x_last)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluate the spline at a given x value.
    ///
    /// Extrapolation beyond the data range uses the boundary polynomial.
    pub fn evaluate(&self, x: f64) -> f64 {
        let (lo, hi) = self.bracket(x);
        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a * a * a - a) * self.y2s[lo] + (b * b * b - b) * self.y2s[hi]) * h * h / 6.0
    }

    /// Binary search for the knot interval enclosing `x`.
    fn bracket(&self, x: f64) -> (usize, usize) {
        let mut lo = 0;
        let mut hi = self.xs.len() - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        (lo, hi)
    }
}
