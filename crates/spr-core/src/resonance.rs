//! Resonance location.
//!
//! Two locators map a sampled reflectance curve to the abscissa of its
//! minimum (the angle of an angular curve, the wavelength of a spectral one):
//!
//! - [`coarse_resonance`]: the grid point with the smallest reflectance.
//! - [`smooth_resonance`]: minimum of a natural cubic spline through the
//!   samples, found with a bounded Brent minimiser. Falls back to the coarse
//!   result whenever the spline or the minimiser cannot be trusted.

use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::brent::BrentOpt;
use serde::{Deserialize, Serialize};
use spr_materials::spline::CubicSpline;

use crate::types::{ReflectanceCurve, SpectralCurve};

/// Absolute tolerance of the smooth locator, in the curve's abscissa unit
/// (degrees for angular curves, nanometres for spectral ones).
pub const LOCATE_TOLERANCE: f64 = 1e-5;

/// Iteration cap for the bounded minimiser.
pub const MAX_ITERATIONS: u64 = 500;

/// Which locator to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResonanceMethod {
    /// Grid argmin. Resolution limited by the grid spacing.
    #[default]
    Coarse,
    /// Spline interpolation plus bounded minimisation.
    Smooth,
}

/// Locate the resonance of a curve, skipping singular samples.
///
/// Returns `None` only when the curve has no defined sample.
pub fn locate(method: ResonanceMethod, curve: &ReflectanceCurve) -> Option<f64> {
    let (angles, reflectance) = curve.defined();
    match method {
        ResonanceMethod::Coarse => coarse_resonance(&reflectance, &angles),
        ResonanceMethod::Smooth => smooth_resonance(&reflectance, &angles),
    }
}

/// Resonance wavelength (nm) of a spectral curve, skipping singular samples.
pub fn locate_spectral(method: ResonanceMethod, curve: &SpectralCurve) -> Option<f64> {
    let (wavelengths, reflectance) = curve.defined();
    match method {
        ResonanceMethod::Coarse => coarse_resonance(&reflectance, &wavelengths),
        ResonanceMethod::Smooth => smooth_resonance(&reflectance, &wavelengths),
    }
}

/// Angle of the smallest reflectance sample.
///
/// Ties resolve to the first occurrence. Non-finite samples are ignored.
pub fn coarse_resonance(reflectance: &[f64], angles_deg: &[f64]) -> Option<f64> {
    first_min_index(reflectance).and_then(|i| angles_deg.get(i).copied())
}

/// Sub-grid resonance angle from a spline through the samples.
///
/// Samples are sorted by angle and repeated angles are collapsed to their
/// first occurrence before fitting. The spline minimum over the full grid is
/// accepted only if it does not exceed the best sample; otherwise the search
/// is repeated within the two grid intervals around the best sample. If
/// neither succeeds, or the spline cannot be built, the coarse result is
/// returned.
pub fn smooth_resonance(reflectance: &[f64], angles_deg: &[f64]) -> Option<f64> {
    let coarse = coarse_resonance(reflectance, angles_deg)?;

    let (xs, ys) = sorted_unique(reflectance, angles_deg);
    let spline = match CubicSpline::try_new(xs.clone(), ys.clone()) {
        Ok(spline) => spline,
        Err(e) => {
            log::warn!("Spline fit failed ({e}); using grid minimum {coarse:.4}");
            return Some(coarse);
        }
    };

    // `ys` is non-empty: the spline needs at least two knots.
    let best = first_min_index(&ys)?;
    let best_value = ys[best];

    let (lower, upper) = spline.domain();
    match spline_minimum(&spline, lower, upper) {
        Some((x, value)) if value <= best_value => return Some(x),
        Some((x, value)) => log::debug!(
            "Global spline minimum {x:.4} (R = {value:.3e}) is above the best sample; refining locally"
        ),
        None => log::debug!("Global spline minimisation failed"),
    }

    let lower = xs[best.saturating_sub(1)];
    let upper = xs[(best + 1).min(xs.len() - 1)];
    match spline_minimum(&spline, lower, upper) {
        Some((x, value)) if value <= best_value => Some(x),
        _ => {
            log::warn!("Smooth locator fell back to grid minimum {coarse:.4}");
            Some(coarse)
        }
    }
}

/// Spline objective for the bounded minimiser.
struct SplineCost<'a>(&'a CubicSpline);

impl CostFunction for SplineCost<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &f64) -> Result<f64, ArgminError> {
        Ok(self.0.evaluate(*x))
    }
}

/// Minimum `(x, value)` of `spline` on `[lower, upper]`, found with Brent's
/// method (golden-section search with parabolic interpolation).
///
/// Converges when the bracket around the current best point shrinks below
/// [`LOCATE_TOLERANCE`] (plus a relative term of √ε·|x|). Returns `None` on
/// an empty bracket, a solver error, a non-finite result or when the
/// iteration cap is hit.
pub fn spline_minimum(spline: &CubicSpline, lower: f64, upper: f64) -> Option<(f64, f64)> {
    if !(lower.is_finite() && upper.is_finite() && lower < upper) {
        log::debug!("Empty minimisation bracket [{lower}, {upper}]");
        return None;
    }

    let solver = BrentOpt::new(lower, upper).set_tolerance(f64::EPSILON.sqrt(), LOCATE_TOLERANCE / 3.0);
    let result = match Executor::new(SplineCost(spline), solver)
        .configure(|state| state.max_iters(MAX_ITERATIONS))
        .run()
    {
        Ok(result) => result,
        Err(e) => {
            log::debug!("Brent minimisation on [{lower}, {upper}] failed: {e}");
            return None;
        }
    };

    let state = result.state();
    if state.get_iter() >= MAX_ITERATIONS {
        log::debug!("Brent minimisation did not converge in {MAX_ITERATIONS} iterations");
        return None;
    }
    let x = *state.get_best_param()?;
    let value = state.get_best_cost();
    (x.is_finite() && value.is_finite()).then_some((x, value))
}

/// Index of the first smallest finite value.
fn first_min_index(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, bv)) if bv <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Samples sorted by angle with repeated angles collapsed to their first occurrence.
fn sorted_unique(reflectance: &[f64], angles_deg: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = angles_deg
        .iter()
        .copied()
        .zip(reflectance.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    pairs.dedup_by(|next, kept| next.0 == kept.0);
    pairs.into_iter().unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn parabola(centre: f64, grid: &[f64]) -> Vec<f64> {
        grid.iter().map(|x| 0.05 + (x - centre).powi(2)).collect()
    }

    #[test]
    fn test_coarse_takes_first_of_tied_minima() {
        let angles = [40.0, 41.0, 42.0, 43.0, 44.0];
        let r = [0.9, 0.2, 0.5, 0.2, 0.8];
        assert_eq!(coarse_resonance(&r, &angles), Some(41.0));
    }

    #[test]
    fn test_coarse_ignores_nan_and_handles_empty() {
        assert_eq!(coarse_resonance(&[], &[]), None);
        assert_eq!(coarse_resonance(&[f64::NAN, 0.4, 0.3], &[1.0, 2.0, 3.0]), Some(3.0));
    }

    #[test]
    fn test_spline_minimum_finds_cosine_minimum() {
        let xs: Vec<f64> = (0..=40).map(|i| 2.0 + 0.05 * i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x.cos()).collect();
        let spline = CubicSpline::try_new(xs, ys).unwrap();
        let (x, value) = spline_minimum(&spline, 3.0, 4.0).unwrap();
        assert_abs_diff_eq!(x, std::f64::consts::PI, epsilon = 1e-4);
        assert_abs_diff_eq!(value, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_spline_minimum_respects_bounds() {
        // Monotone objective: minimum sits at the upper bound.
        let spline = CubicSpline::try_new(vec![0.0, 1.0, 2.0], vec![0.0, -1.0, -2.0]).unwrap();
        let (x, _) = spline_minimum(&spline, 0.0, 2.0).unwrap();
        assert!(x <= 2.0 && x > 2.0 - 1e-4, "x = {x}");
    }

    #[test]
    fn test_spline_minimum_rejects_empty_bracket() {
        let spline = CubicSpline::try_new(vec![0.0, 1.0, 2.0], vec![1.0, 0.0, 1.0]).unwrap();
        assert_eq!(spline_minimum(&spline, 2.0, 1.0), None);
        assert_eq!(spline_minimum(&spline, 1.0, 1.0), None);
        assert_eq!(spline_minimum(&spline, f64::NAN, 1.0), None);
    }

    #[test]
    fn test_locate_spectral_finds_resonance_wavelength() {
        let wavelengths_nm: Vec<f64> = (0..=60).map(|i| 600.0 + 2.0 * i as f64).collect();
        let curve = SpectralCurve {
            angle_deg: 72.0,
            reflectance: parabola(667.35, &wavelengths_nm)
                .into_iter()
                .map(|r| Some(r * 1e-3))
                .collect(),
            wavelengths_nm,
        };
        assert_eq!(locate_spectral(ResonanceMethod::Coarse, &curve), Some(668.0));
        let smooth = locate_spectral(ResonanceMethod::Smooth, &curve).unwrap();
        assert_abs_diff_eq!(smooth, 667.35, epsilon = 1e-3);
    }

    #[test]
    fn test_smooth_finds_sub_grid_minimum() {
        let angles: Vec<f64> = (0..25).map(|i| 55.0 + 0.5 * i as f64).collect();
        let r = parabola(61.23, &angles);
        let coarse = coarse_resonance(&r, &angles).unwrap();
        let smooth = smooth_resonance(&r, &angles).unwrap();
        assert_eq!(coarse, 61.0);
        assert_abs_diff_eq!(smooth, 61.23, epsilon = 1e-3);
    }

    #[test]
    fn test_smooth_sorts_and_deduplicates() {
        let mut angles: Vec<f64> = (0..25).map(|i| 55.0 + 0.5 * i as f64).collect();
        let mut r = parabola(61.23, &angles);
        // Duplicate an angle with a spurious later value, then shuffle.
        angles.push(61.0);
        r.push(10.0);
        angles.swap(0, 24);
        r.swap(0, 24);
        let smooth = smooth_resonance(&r, &angles).unwrap();
        assert_abs_diff_eq!(smooth, 61.23, epsilon = 1e-3);
    }

    #[test]
    fn test_smooth_falls_back_to_coarse_when_spline_fails() {
        // A single distinct angle cannot carry a spline.
        assert_eq!(smooth_resonance(&[0.4, 0.3], &[50.0, 50.0]), Some(50.0));
        assert_eq!(smooth_resonance(&[0.4], &[50.0]), Some(50.0));
        // Non-finite sample: spline rejects it, coarse skips it.
        assert_eq!(
            smooth_resonance(&[0.4, f64::INFINITY, 0.1, 0.3], &[50.0, 51.0, 52.0, 53.0]),
            Some(52.0)
        );
        assert_eq!(smooth_resonance(&[], &[]), None);
    }

    #[test]
    fn test_locate_skips_singular_samples() {
        let curve = ReflectanceCurve {
            angles_deg: vec![60.0, 61.0, 62.0, 63.0],
            reflectance: vec![Some(0.6), None, Some(0.1), Some(0.5)],
        };
        assert_eq!(locate(ResonanceMethod::Coarse, &curve), Some(62.0));
        let smooth = locate(ResonanceMethod::Smooth, &curve).unwrap();
        assert!((60.0..=63.0).contains(&smooth));
    }

    #[test]
    fn test_method_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            method: ResonanceMethod,
        }
        let w: Wrapper = serde_json::from_str(r#"{"method":"smooth"}"#).unwrap();
        assert_eq!(w.method, ResonanceMethod::Smooth);
        assert_eq!(ResonanceMethod::default(), ResonanceMethod::Coarse);
    }
}
