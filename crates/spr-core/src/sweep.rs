//! Angular and spectral reflectance sweeps.
//!
//! Each grid point is an independent call to the solver, so the sweeps are
//! evaluated with Rayon and collected back in grid order. Configuration
//! errors abort the sweep; singular points become `None` samples.

use rayon::prelude::*;
use serde::Serialize;

use crate::solver::{check_angle, check_wavelength, ReflectanceSolver, SolverError};
use crate::types::{LayerStack, ReflectanceCurve, SpectralCurve};

/// Incidence angles (degrees) at which a stack is evaluated.
///
/// Angles are finite, lie in $[0°, 90°)$ and are sorted in non-decreasing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AngleGrid {
    degrees: Vec<f64>,
}

impl AngleGrid {
    /// Grid from explicit angles in degrees.
    pub fn new(degrees: Vec<f64>) -> Result<Self, SolverError> {
        if degrees.is_empty() {
            return Err(SolverError::InvalidGrid("angle grid is empty".into()));
        }
        for &deg in &degrees {
            check_angle(deg.to_radians())?;
        }
        if degrees.windows(2).any(|w| w[1] < w[0]) {
            return Err(SolverError::InvalidGrid(
                "angle grid must be sorted in ascending order".into(),
            ));
        }
        Ok(Self { degrees })
    }

    /// `points` evenly spaced angles from `start` to `end` inclusive.
    pub fn linspace(start_deg: f64, end_deg: f64, points: usize) -> Result<Self, SolverError> {
        Self::new(linspace(start_deg, end_deg, points))
    }

    /// Angles from `start` to `end` inclusive in increments of `step`.
    pub fn stepped(start_deg: f64, end_deg: f64, step_deg: f64) -> Result<Self, SolverError> {
        Self::new(stepped(start_deg, end_deg, step_deg)?)
    }

    pub fn degrees(&self) -> &[f64] {
        &self.degrees
    }

    pub fn radians(&self) -> Vec<f64> {
        self.degrees.iter().map(|d| d.to_radians()).collect()
    }

    pub fn len(&self) -> usize {
        self.degrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }
}

/// `points` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..points)
            .map(|i| start + (end - start) * i as f64 / (points - 1) as f64)
            .collect(),
    }
}

/// Values from `start` to `end` inclusive in increments of `step`.
///
/// The end point is included when it lies within 1e-9 steps of a step multiple.
pub fn stepped(start: f64, end: f64, step: f64) -> Result<Vec<f64>, SolverError> {
    if !(start.is_finite() && end.is_finite() && step.is_finite() && step > 0.0) || end < start {
        return Err(SolverError::InvalidGrid(format!(
            "invalid range [{start}, {end}] with step {step}"
        )));
    }
    let count = ((end - start) / step + 1e-9).floor() as usize + 1;
    Ok((0..count).map(|i| start + i as f64 * step).collect())
}

/// Reflectance of one stack over an angle grid.
pub fn angular_sweep<S: ReflectanceSolver + ?Sized>(
    solver: &S,
    stack: &LayerStack,
    wavelength_m: f64,
    grid: &AngleGrid,
) -> Result<ReflectanceCurve, SolverError> {
    check_wavelength(wavelength_m)?;

    let reflectance = grid
        .degrees()
        .par_iter()
        .map(|deg| sample(solver.reflect(stack, deg.to_radians(), wavelength_m)))
        .collect::<Result<Vec<_>, _>>()?;

    let curve = ReflectanceCurve {
        angles_deg: grid.degrees().to_vec(),
        reflectance,
    };
    let singular = curve.singular_count();
    if singular > 0 {
        log::warn!(
            "{} of {} angles were singular for a {}-medium stack",
            singular,
            grid.len(),
            stack.len()
        );
    }
    Ok(curve)
}

/// Reflectance of one stack over a set of vacuum wavelengths at a fixed angle.
///
/// The stack's indices are held fixed across the scan, so this models a
/// non-dispersive stack under wavelength interrogation.
pub fn spectral_sweep<S: ReflectanceSolver + ?Sized>(
    solver: &S,
    stack: &LayerStack,
    theta_rad: f64,
    wavelengths_m: &[f64],
) -> Result<SpectralCurve, SolverError> {
    check_angle(theta_rad)?;
    for &wl in wavelengths_m {
        check_wavelength(wl)?;
    }

    let reflectance = wavelengths_m
        .par_iter()
        .map(|&wl| sample(solver.reflect(stack, theta_rad, wl)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SpectralCurve {
        angle_deg: theta_rad.to_degrees(),
        wavelengths_nm: wavelengths_m.iter().map(|wl| wl * 1e9).collect(),
        reflectance,
    })
}

/// Keep configuration errors, demote singular points to missing samples.
fn sample(
    result: Result<crate::types::FresnelCoefficients, SolverError>,
) -> Result<Option<f64>, SolverError> {
    match result {
        Ok(coefficients) => Ok(Some(coefficients.reflectance)),
        Err(e) if e.is_singular() => {
            log::debug!("{e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::tmm::TransferMatrixSolver;
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;

    fn silver_film() -> LayerStack {
        LayerStack::new(
            vec![
                Complex64::new(1.732, 0.0),
                Complex64::new(0.1325, 4.0203),
                Complex64::new(1.335, 0.0),
            ],
            vec![43e-9],
        )
        .unwrap()
    }

    #[test]
    fn test_linspace_includes_both_ends() {
        let grid = AngleGrid::linspace(40.0, 80.0, 4001).unwrap();
        assert_eq!(grid.len(), 4001);
        assert_eq!(grid.degrees()[0], 40.0);
        assert_abs_diff_eq!(grid.degrees()[4000], 80.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.degrees()[1] - grid.degrees()[0], 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_stepped_grid_includes_end_point() {
        let grid = AngleGrid::stepped(40.0, 80.0, 0.1).unwrap();
        assert_eq!(grid.len(), 401);
        assert_abs_diff_eq!(*grid.degrees().last().unwrap(), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shared_grid_helpers() {
        assert_eq!(linspace(1.0, 2.0, 0), Vec::<f64>::new());
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert_eq!(linspace(1.0, 2.0, 3), vec![1.0, 1.5, 2.0]);
        assert_eq!(stepped(-2.0, 2.0, 1.0).unwrap(), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(stepped(0.0, 1.05, 0.5).unwrap(), vec![0.0, 0.5, 1.0]);
        assert!(matches!(stepped(0.0, 1.0, -0.5), Err(SolverError::InvalidGrid(_))));
        assert!(matches!(stepped(1.0, 0.0, 0.5), Err(SolverError::InvalidGrid(_))));
        assert!(matches!(stepped(f64::NAN, 1.0, 0.5), Err(SolverError::InvalidGrid(_))));
    }

    #[test]
    fn test_grid_errors_name_the_grid() {
        assert!(matches!(AngleGrid::new(vec![]), Err(SolverError::InvalidGrid(_))));
        assert!(matches!(
            AngleGrid::new(vec![50.0, 40.0]),
            Err(SolverError::InvalidGrid(_))
        ));
        assert!(matches!(
            AngleGrid::stepped(40.0, 80.0, 0.0),
            Err(SolverError::InvalidGrid(_))
        ));
        assert!(matches!(
            AngleGrid::linspace(40.0, 80.0, 0),
            Err(SolverError::InvalidGrid(_))
        ));
        // Out-of-range angles stay angle errors.
        assert!(matches!(
            AngleGrid::new(vec![40.0, 90.0]),
            Err(SolverError::InvalidAngle(_))
        ));
    }

    #[test]
    fn test_grid_rejects_bad_angles() {
        assert!(AngleGrid::new(vec![]).is_err());
        assert!(AngleGrid::new(vec![40.0, 90.0]).is_err());
        assert!(AngleGrid::new(vec![-1.0, 10.0]).is_err());
        assert!(AngleGrid::new(vec![50.0, 40.0]).is_err());
        assert!(AngleGrid::stepped(40.0, 80.0, 0.0).is_err());
        // Repeated angles are allowed; the smooth locator deduplicates them.
        assert!(AngleGrid::new(vec![40.0, 40.0, 41.0]).is_ok());
    }

    #[test]
    fn test_angular_sweep_matches_pointwise_calls() {
        let stack = silver_film();
        let grid = AngleGrid::stepped(40.0, 80.0, 1.0).unwrap();
        let curve = angular_sweep(&TransferMatrixSolver, &stack, 633e-9, &grid).unwrap();
        assert_eq!(curve.angles_deg.len(), curve.reflectance.len());
        for (deg, r) in curve.angles_deg.iter().zip(&curve.reflectance) {
            let direct = TransferMatrixSolver
                .reflect(&stack, deg.to_radians(), 633e-9)
                .unwrap()
                .reflectance;
            assert_eq!(r.unwrap(), direct);
        }
    }

    #[test]
    fn test_angular_sweep_marks_singular_points() {
        let stack = LayerStack::new(
            vec![Complex64::new(1.5, 0.0), Complex64::new(0.0, 0.0)],
            vec![],
        )
        .unwrap();
        let grid = AngleGrid::stepped(10.0, 20.0, 5.0).unwrap();
        let curve = angular_sweep(&TransferMatrixSolver, &stack, 633e-9, &grid).unwrap();
        assert_eq!(curve.singular_count(), 3);
        assert!(curve.min_reflectance().is_none());
    }

    #[test]
    fn test_angular_sweep_rejects_bad_wavelength() {
        let grid = AngleGrid::stepped(40.0, 50.0, 1.0).unwrap();
        let err = angular_sweep(&TransferMatrixSolver, &silver_film(), -1.0, &grid).unwrap_err();
        assert_eq!(err, SolverError::InvalidWavelength(-1.0));
    }

    #[test]
    fn test_spectral_sweep_respects_energy_bound() {
        // Fixed-index silver film interrogated in wavelength near its resonance angle.
        let stack = silver_film();
        let wavelengths: Vec<f64> = (0..200).map(|i| (500.0 + 2.0 * i as f64) * 1e-9).collect();
        let curve =
            spectral_sweep(&TransferMatrixSolver, &stack, 62.0_f64.to_radians(), &wavelengths)
                .unwrap();
        assert_eq!(curve.wavelengths_nm.len(), 200);
        assert_abs_diff_eq!(curve.wavelengths_nm[0], 500.0, epsilon = 1e-9);
        let (_, r) = curve.defined();
        assert!(r.iter().all(|&v| (0.0..=1.0 + 1e-9).contains(&v)));
    }
}
