//! Reflectance solver abstraction and implementations.
//!
//! The [`ReflectanceSolver`] trait defines the interface the sweeps and the
//! orchestrator are written against. The transfer-matrix method for
//! p-polarised light ([`tmm::TransferMatrixSolver`]) is the implementation
//! used throughout.

pub mod tmm;

use thiserror::Error;

use crate::types::{FresnelCoefficients, LayerStack};

/// Errors that can occur while evaluating a stack.
///
/// `InvalidStack`, `InvalidGrid`, `InvalidWavelength` and `InvalidAngle` are
/// configuration errors and abort a run. `Singular` is a per-point numerical event: sweeps
/// record it as an undefined sample and carry on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("Invalid layer stack: {0}")]
    InvalidStack(String),

    #[error("Invalid sample grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid wavelength {0} m: must be positive and finite")]
    InvalidWavelength(f64),

    #[error("Invalid incidence angle {0} rad: must lie in [0, π/2)")]
    InvalidAngle(f64),

    #[error("Singular reflection denominator at θ = {theta_deg:.4}°")]
    Singular { theta_deg: f64 },
}

impl SolverError {
    /// Whether this error marks a single undefined point rather than a bad configuration.
    pub fn is_singular(&self) -> bool {
        matches!(self, SolverError::Singular { .. })
    }
}

/// The core trait that reflectance engines implement.
pub trait ReflectanceSolver: Send + Sync {
    /// Reflection/transmission of `stack` at incidence angle `theta_rad`
    /// (measured in the incidence medium) and vacuum wavelength `wavelength_m`.
    fn reflect(
        &self,
        stack: &LayerStack,
        theta_rad: f64,
        wavelength_m: f64,
    ) -> Result<FresnelCoefficients, SolverError>;

    /// Human-readable name of the method.
    fn method_name(&self) -> &str;
}

pub(crate) fn check_wavelength(wavelength_m: f64) -> Result<(), SolverError> {
    if wavelength_m.is_finite() && wavelength_m > 0.0 {
        Ok(())
    } else {
        Err(SolverError::InvalidWavelength(wavelength_m))
    }
}

pub(crate) fn check_angle(theta_rad: f64) -> Result<(), SolverError> {
    if theta_rad.is_finite() && (0.0..std::f64::consts::FRAC_PI_2).contains(&theta_rad) {
        Ok(())
    } else {
        Err(SolverError::InvalidAngle(theta_rad))
    }
}
