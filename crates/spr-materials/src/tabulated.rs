//! Tabulated dispersive materials.
//!
//! Optical constants given as $(\lambda, n, k)$ rows, e.g. transcribed from
//! a handbook or a refractive-index database export, are interpolated with
//! natural cubic splines on $n$ and $k$ separately. Queries outside the
//! tabulated range are rejected rather than extrapolated.

use num_complex::Complex64;

use crate::provider::{check_range, MaterialError, MaterialProvider};
use crate::spline::CubicSpline;

/// Material with spline-interpolated $n(\lambda)$ and $k(\lambda)$.
#[derive(Debug, Clone)]
pub struct TabulatedMaterial {
    name: String,
    wavelengths_nm: Vec<f64>,
    spline_n: CubicSpline,
    spline_k: CubicSpline,
}

impl TabulatedMaterial {
    /// Construct from `(wavelength_nm, n, k)` rows.
    ///
    /// Rows must be sorted by strictly increasing wavelength and `k` must be
    /// non-negative (passive media only).
    pub fn from_rows(name: impl Into<String>, rows: &[(f64, f64, f64)]) -> Result<Self, MaterialError> {
        let name = name.into();
        if let Some(&(lam, _, k)) = rows.iter().find(|&&(_, _, k)| k < 0.0) {
            return Err(MaterialError::DataError(format!(
                "{name}: negative extinction coefficient k={k} at {lam} nm"
            )));
        }

        let wavelengths_nm: Vec<f64> = rows.iter().map(|&(lam, _, _)| lam).collect();
        let n: Vec<f64> = rows.iter().map(|&(_, n, _)| n).collect();
        let k: Vec<f64> = rows.iter().map(|&(_, _, k)| k).collect();

        let spline_n = CubicSpline::try_new(wavelengths_nm.clone(), n)
            .map_err(|e| MaterialError::DataError(format!("{name}: {e}")))?;
        let spline_k = CubicSpline::try_new(wavelengths_nm.clone(), k)
            .map_err(|e| MaterialError::DataError(format!("{name}: {e}")))?;

        Ok(Self {
            name,
            wavelengths_nm,
            spline_n,
            spline_k,
        })
    }
}

impl MaterialProvider for TabulatedMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> Option<(f64, f64)> {
        Some((
            self.wavelengths_nm[0],
            self.wavelengths_nm[self.wavelengths_nm.len() - 1],
        ))
    }

    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        check_range(self.wavelength_range(), wavelength_nm)?;
        let n = self.spline_n.evaluate(wavelength_nm);
        // Spline overshoot near an absorption edge must not turn a passive medium into gain.
        let k = self.spline_k.evaluate(wavelength_nm).max(0.0);
        Ok(Complex64::new(n, k))
    }
}
