//! Full width at half maximum of a reflectance dip.
//!
//! The half level sits midway between the largest and smallest sample. A
//! crossing is recorded between samples `i` and `i + 1` whenever the sign of
//! `R - half` differs (zero counts as its own sign), and the crossing angle
//! is taken at sample `i`. The width spans the first and last crossings, so
//! its resolution is bounded by the grid spacing.

use serde::Serialize;

/// Angular linewidth of a resonance dip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Linewidth {
    pub width_deg: f64,
    pub first_crossing_deg: f64,
    pub last_crossing_deg: f64,
}

impl Linewidth {
    /// Midpoint of the two crossing angles.
    pub fn centre_deg(&self) -> f64 {
        0.5 * (self.first_crossing_deg + self.last_crossing_deg)
    }

    /// Approximate spectral width (nm) at vacuum wavelength `lambda0_nm`.
    ///
    /// Uses $\Delta\lambda \approx \Delta\theta \cdot \lambda_0 / \tan\theta_c$,
    /// linearised at the crossing midpoint $\theta_c$. Only meaningful for
    /// narrow resonances.
    pub fn spectral_width_nm(&self, lambda0_nm: f64) -> Option<f64> {
        let slope = wavelength_slope_nm_per_rad(lambda0_nm, self.centre_deg())?;
        Some((self.width_deg.to_radians() * slope).abs())
    }
}

/// Half-maximum linewidth of a sampled curve.
///
/// Returns `None` when fewer than two crossings exist (flat or monotone
/// curves, dips cut off by the grid) or when the inputs are empty or of
/// different lengths.
pub fn fwhm(reflectance: &[f64], angles_deg: &[f64]) -> Option<Linewidth> {
    if reflectance.is_empty() || reflectance.len() != angles_deg.len() {
        return None;
    }
    if reflectance.iter().any(|r| !r.is_finite()) {
        return None;
    }

    let max = reflectance.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = reflectance.iter().copied().fold(f64::INFINITY, f64::min);
    let half = 0.5 * (max + min);

    let side = |r: f64| {
        let d = r - half;
        if d > 0.0 {
            1
        } else if d < 0.0 {
            -1
        } else {
            0
        }
    };

    let mut crossings = reflectance
        .windows(2)
        .enumerate()
        .filter(|(_, w)| side(w[0]) != side(w[1]))
        .map(|(i, _)| i);

    let first = crossings.next()?;
    let last = crossings.last()?;

    let (a, b) = (angles_deg[first], angles_deg[last]);
    Some(Linewidth {
        width_deg: (b - a).abs(),
        first_crossing_deg: a,
        last_crossing_deg: b,
    })
}

/// Spectral FWHM (nm) of an angular curve at vacuum wavelength `lambda0_nm`.
pub fn spectral_fwhm_nm(reflectance: &[f64], angles_deg: &[f64], lambda0_nm: f64) -> Option<f64> {
    fwhm(reflectance, angles_deg)?.spectral_width_nm(lambda0_nm)
}

/// Local slope $d\lambda/d\theta \approx \lambda_0 / \tan\theta$ in nm per radian.
///
/// `None` at normal incidence, where the linearisation diverges.
pub fn wavelength_slope_nm_per_rad(lambda0_nm: f64, theta_deg: f64) -> Option<f64> {
    let tan = theta_deg.to_radians().tan();
    let slope = lambda0_nm / tan;
    (tan != 0.0 && slope.is_finite()).then_some(slope)
}
