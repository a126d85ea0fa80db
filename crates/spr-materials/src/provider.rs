//! Material property provider trait.
//!
//! All optical-constant sources implement [`MaterialProvider`], which returns
//! the complex refractive index $\tilde{n} = n + ik$ of a medium, with
//! $k \geq 0$ for absorbing media.

use num_complex::Complex64;
use thiserror::Error;

/// Errors from material providers.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Wavelength {wavelength_nm} nm is outside the data range [{min}, {max}] nm")]
    OutOfRange {
        wavelength_nm: f64,
        min: f64,
        max: f64,
    },

    #[error("Material not found: {0}")]
    NotFound(String),

    #[error("Data error: {0}")]
    DataError(String),
}

/// Provides wavelength-dependent optical constants.
///
/// Implementations include fixed reference constants
/// ([`ConstantMaterial`](crate::constant::ConstantMaterial)) and tabulated
/// $(\lambda, n, k)$ data ([`TabulatedMaterial`](crate::tabulated::TabulatedMaterial)).
pub trait MaterialProvider: Send + Sync {
    /// Human-readable name of this material.
    fn name(&self) -> &str;

    /// Wavelength range over which data is available (nm).
    ///
    /// `None` for non-dispersive materials, which are valid at any wavelength.
    fn wavelength_range(&self) -> Option<(f64, f64)>;

    /// Complex refractive index $\tilde{n} = n + ik$ at a given wavelength.
    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError>;

    /// Complex dielectric function $\epsilon(\lambda)$.
    ///
    /// Default implementation derives from $\epsilon = \tilde{n}^2$ (non-magnetic media).
    fn dielectric_function(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        let n = self.refractive_index(wavelength_nm)?;
        Ok(n * n)
    }
}

/// Reject wavelengths outside `range`, if the provider has one.
pub(crate) fn check_range(range: Option<(f64, f64)>, wavelength_nm: f64) -> Result<(), MaterialError> {
    if let Some((min, max)) = range {
        if wavelength_nm < min || wavelength_nm > max {
            return Err(MaterialError::OutOfRange {
                wavelength_nm,
                min,
                max,
            });
        }
    }
    Ok(())
}
