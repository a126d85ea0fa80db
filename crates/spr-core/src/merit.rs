//! Sensor figures of merit.
//!
//! Scalar formulas for sensitivity, χ and Q, plus [`figures_of_merit`],
//! which turns a finished sweep into per-metal series aligned with the
//! thickness sequence. Every quantity that can fail to exist (equal indices,
//! zero linewidth, no propagating surface mode) is an `Option`.
//!
//! # Theoretical sensitivity
//!
//! With $\varepsilon_{mr} = \mathrm{Re}(\tilde{n}_m^2)$, analyte index $n_s$
//! and substrate index $n_2$:
//!
//! $$
//! S = \frac{\varepsilon_{mr}^2}
//!          {|\varepsilon_{mr} + n_s^2|\,
//!           \sqrt{\varepsilon_{mr} n_2^2 (\varepsilon_{mr} + n_s^2) - \varepsilon_{mr}^2 n_s^2}}
//! $$
//!
//! in rad/RIU, reported in °/RIU. It does not depend on metal thickness.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::linewidth::wavelength_slope_nm_per_rad;
use crate::orchestrator::{Analyte, SweepError, SweepResults};

/// Angular sensitivity $(\theta_a - \theta_b)/(n_a - n_b)$ in °/RIU.
pub fn angular_sensitivity(theta_a_deg: f64, theta_b_deg: f64, n_a: f64, n_b: f64) -> Option<f64> {
    let dn = n_a - n_b;
    let s = (theta_a_deg - theta_b_deg) / dn;
    (dn != 0.0 && s.is_finite()).then_some(s)
}

/// Spectral sensitivity in nm/RIU from two resonance angles.
///
/// Angle shifts are mapped to wavelength shifts with the local slope
/// $\lambda_0/\tan\theta$ evaluated at the mean of the two angles.
pub fn spectral_sensitivity(
    theta_a_deg: f64,
    theta_b_deg: f64,
    n_a: f64,
    n_b: f64,
    lambda0_nm: f64,
) -> Option<f64> {
    let slope = wavelength_slope_nm_per_rad(lambda0_nm, 0.5 * (theta_a_deg + theta_b_deg))?;
    let dn = n_a - n_b;
    let s = slope * (theta_a_deg - theta_b_deg).to_radians() / dn;
    (dn != 0.0 && s.is_finite()).then_some(s)
}

/// χ = sensitivity / FWHM.
pub fn chi(sensitivity: f64, fwhm: f64) -> Option<f64> {
    ratio(sensitivity, fwhm)
}

/// Q = θ_res / FWHM.
pub fn quality_factor(theta_res_deg: f64, fwhm_deg: f64) -> Option<f64> {
    ratio(theta_res_deg, fwhm_deg)
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    let v = num / den;
    (den != 0.0 && v.is_finite()).then_some(v)
}

/// Closed-form angular sensitivity in °/RIU.
///
/// `None` when the root term is non-positive or $\varepsilon_{mr} = -n_s^2$:
/// the structure supports no propagating surface mode in this approximation.
pub fn theoretical_sensitivity(eps_mr: f64, n_s: f64, n_2: f64) -> Option<f64> {
    let ns2 = n_s * n_s;
    let numerator = eps_mr * eps_mr;
    let denominator = (eps_mr + ns2).abs();
    let root_term = eps_mr * n_2 * n_2 * (eps_mr + ns2) - eps_mr * eps_mr * ns2;
    if root_term <= 0.0 || denominator == 0.0 {
        return None;
    }
    let s = (numerator / (denominator * root_term.sqrt())).to_degrees();
    s.is_finite().then_some(s)
}

/// Surface-plasmon coupling angle in degrees:
/// $\sin\theta = \sqrt{\varepsilon_{mr} n_s^2 / (\varepsilon_{mr} + n_s^2)} / n_2$.
pub fn theoretical_resonance_angle(eps_mr: f64, n_s: f64, n_2: f64) -> Option<f64> {
    let ns2 = n_s * n_s;
    let radicand = eps_mr * ns2 / (eps_mr + ns2);
    if !(radicand.is_finite() && radicand > 0.0) || n_2 <= 0.0 {
        return None;
    }
    let sin = radicand.sqrt() / n_2;
    (sin <= 1.0).then(|| sin.asin().to_degrees())
}

/// Which analytes of a sweep form the sensitivity pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensingPair {
    /// Lower-index analyte.
    pub low: String,
    /// Higher-index analyte.
    pub high: String,
    /// Analyte whose resonance and linewidth feed χ and Q.
    pub reference: String,
}

impl SensingPair {
    pub fn new(low: impl Into<String>, high: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            low: low.into(),
            high: high.into(),
            reference: reference.into(),
        }
    }

    /// Check that every named analyte is part of `analytes`.
    pub fn validate(&self, analytes: &[Analyte]) -> Result<(), SweepError> {
        for name in [&self.low, &self.high, &self.reference] {
            if !analytes.iter().any(|a| &a.name == name) {
                return Err(SweepError::InvalidPlan(format!(
                    "sensing analyte '{name}' is not part of the sweep"
                )));
            }
        }
        Ok(())
    }
}

/// Figures of merit of one metal, one entry per swept thickness.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FigureOfMeritSeries {
    pub thicknesses_nm: Vec<f64>,
    /// Resonance angle of the reference analyte.
    pub theta_res_deg: Vec<Option<f64>>,
    /// Angular linewidth of the reference analyte.
    pub fwhm_deg: Vec<Option<f64>>,
    /// Spectral linewidth of the reference analyte.
    pub fwhm_nm: Vec<Option<f64>>,
    pub sensitivity_empirical: Vec<Option<f64>>,
    pub sensitivity_theoretical: Vec<Option<f64>>,
    pub sensitivity_spectral: Vec<Option<f64>>,
    pub chi_empirical: Vec<Option<f64>>,
    pub chi_theoretical: Vec<Option<f64>>,
    pub chi_spectral: Vec<Option<f64>>,
    pub q_empirical: Vec<Option<f64>>,
    pub q_theoretical: Vec<Option<f64>>,
    /// Thickness-independent coupling angle used by `q_theoretical`.
    pub theta_spr_theoretical_deg: Option<f64>,
}

/// Per-metal figure-of-merit series from a finished sweep.
pub fn figures_of_merit(
    results: &SweepResults,
    pair: &SensingPair,
) -> Result<BTreeMap<String, FigureOfMeritSeries>, SweepError> {
    pair.validate(&results.analytes)?;
    let index_of = |name: &str| {
        results
            .analyte(name)
            .map(|a| a.index.re)
            .ok_or_else(|| SweepError::InvalidPlan(format!("unknown analyte '{name}'")))
    };
    let n_low = index_of(&pair.low)?;
    let n_high = index_of(&pair.high)?;
    let n_ref = index_of(&pair.reference)?;
    let n_substrate = results.substrate_index.re;
    let lambda0_nm = results.wavelength_m * 1e9;

    if n_low == n_high {
        log::warn!(
            "Sensing pair '{}'/'{}' has equal indices; sensitivity is undefined",
            pair.low,
            pair.high
        );
    }

    let mut figures = BTreeMap::new();
    for (metal, &metal_index) in &results.metal_indices {
        let run_for = |analyte: &str| {
            results.run(metal, analyte).ok_or_else(|| {
                SweepError::InvalidPlan(format!("no run for {metal}/{analyte}"))
            })
        };
        let low = run_for(&pair.low)?;
        let high = run_for(&pair.high)?;
        let reference = run_for(&pair.reference)?;

        let eps_mr = (metal_index * metal_index).re;
        let s_theo = theoretical_sensitivity(eps_mr, n_ref, n_substrate);
        let theta_spr = theoretical_resonance_angle(eps_mr, n_ref, n_substrate);

        let mut series = FigureOfMeritSeries {
            thicknesses_nm: results.thicknesses_nm.clone(),
            theta_spr_theoretical_deg: theta_spr,
            ..Default::default()
        };

        for ((lo, hi), rec) in low.records.iter().zip(&high.records).zip(&reference.records) {
            let theta = rec.theta_res_deg;
            let width = rec.fwhm_deg();
            let width_nm = rec.fwhm.and_then(|lw| lw.spectral_width_nm(lambda0_nm));

            let (s, s_lambda) = match (hi.theta_res_deg, lo.theta_res_deg) {
                (Some(th), Some(tl)) => (
                    angular_sensitivity(th, tl, n_high, n_low),
                    spectral_sensitivity(th, tl, n_high, n_low, lambda0_nm),
                ),
                _ => (None, None),
            };

            series.theta_res_deg.push(theta);
            series.fwhm_deg.push(width);
            series.fwhm_nm.push(width_nm);
            series.sensitivity_empirical.push(s);
            series.sensitivity_theoretical.push(s_theo);
            series.sensitivity_spectral.push(s_lambda);
            series.chi_empirical.push(s.zip(width).and_then(|(s, w)| chi(s, w)));
            series.chi_theoretical.push(s_theo.zip(width).and_then(|(s, w)| chi(s, w)));
            series.chi_spectral.push(s_lambda.zip(width_nm).and_then(|(s, w)| chi(s, w)));
            series.q_empirical.push(theta.zip(width).and_then(|(t, w)| quality_factor(t, w)));
            series
                .q_theoretical
                .push(theta_spr.zip(width).and_then(|(t, w)| quality_factor(t, w)));
        }

        log::debug!(
            "{metal}: S_theo = {s_theo:?} °/RIU, θ_spr = {theta_spr:?}°"
        );
        figures.insert(metal.clone(), series);
    }
    Ok(figures)
}
