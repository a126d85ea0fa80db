//! Core types shared across the SPR pipeline.
//!
//! This module defines the layer stack consumed by the reflectance engine,
//! the per-point Fresnel result, and the reflectance curves produced by the
//! angular and spectral sweeps.

use num_complex::Complex64;
use serde::Serialize;

use crate::solver::SolverError;

/// An ordered planar multilayer.
///
/// Layer 0 is the semi-infinite incidence medium (prism/substrate), layer
/// `N-1` the semi-infinite exit medium (analyte). Layers `1..N-1` are
/// finite films; `thicknesses_m[k - 1]` is the thickness of layer `k`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerStack {
    indices: Vec<Complex64>,
    thicknesses_m: Vec<f64>,
}

impl LayerStack {
    /// Build a stack from refractive indices and internal-layer thicknesses.
    ///
    /// # Errors
    /// [`SolverError::InvalidStack`] if fewer than two media are given, if
    /// `thicknesses_m.len() != indices.len() - 2`, if any index or thickness
    /// is non-finite, if a thickness is negative, or if the incidence medium
    /// has a non-positive real index.
    pub fn new(indices: Vec<Complex64>, thicknesses_m: Vec<f64>) -> Result<Self, SolverError> {
        if indices.len() < 2 {
            return Err(SolverError::InvalidStack(format!(
                "need at least 2 media, got {}",
                indices.len()
            )));
        }
        if thicknesses_m.len() != indices.len() - 2 {
            return Err(SolverError::InvalidStack(format!(
                "{} media need {} internal thicknesses, got {}",
                indices.len(),
                indices.len() - 2,
                thicknesses_m.len()
            )));
        }
        if let Some(k) = indices.iter().position(|n| !n.is_finite()) {
            return Err(SolverError::InvalidStack(format!(
                "refractive index of layer {k} is not finite"
            )));
        }
        if let Some(k) = thicknesses_m.iter().position(|d| !d.is_finite() || *d < 0.0) {
            return Err(SolverError::InvalidStack(format!(
                "thickness of layer {} must be finite and non-negative, got {}",
                k + 1,
                thicknesses_m[k]
            )));
        }
        if indices[0].re <= 0.0 {
            return Err(SolverError::InvalidStack(format!(
                "incidence medium must have a positive real index, got {}",
                indices[0]
            )));
        }
        Ok(Self {
            indices,
            thicknesses_m,
        })
    }

    /// Start a stack from its incidence medium.
    pub fn builder(incidence: Complex64) -> StackBuilder {
        StackBuilder {
            indices: vec![incidence],
            thicknesses_m: Vec::new(),
        }
    }

    /// Number of media, including both semi-infinite ones.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always false: a valid stack holds at least two media.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[Complex64] {
        &self.indices
    }

    pub fn thicknesses_m(&self) -> &[f64] {
        &self.thicknesses_m
    }

    pub fn incidence(&self) -> Complex64 {
        self.indices[0]
    }

    pub fn exit(&self) -> Complex64 {
        self.indices[self.indices.len() - 1]
    }

    /// Internal layers as `(index, thickness_m)` in physical order.
    pub fn internal_layers(&self) -> impl Iterator<Item = (Complex64, f64)> + '_ {
        self.indices[1..self.indices.len() - 1]
            .iter()
            .copied()
            .zip(self.thicknesses_m.iter().copied())
    }
}

/// Incremental construction of a [`LayerStack`].
#[derive(Debug, Clone)]
pub struct StackBuilder {
    indices: Vec<Complex64>,
    thicknesses_m: Vec<f64>,
}

impl StackBuilder {
    /// Append a finite film.
    pub fn layer(mut self, index: Complex64, thickness_m: f64) -> Self {
        self.indices.push(index);
        self.thicknesses_m.push(thickness_m);
        self
    }

    /// Close the stack with the semi-infinite exit medium.
    pub fn exit(mut self, index: Complex64) -> Result<LayerStack, SolverError> {
        self.indices.push(index);
        LayerStack::new(self.indices, self.thicknesses_m)
    }
}

/// Reflection and transmission of a stack for one (angle, wavelength) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FresnelCoefficients {
    /// Complex amplitude reflection coefficient $r$.
    pub r: Complex64,
    /// Complex amplitude transmission coefficient $t$ (tangential H field).
    pub t: Complex64,
    /// Reflectance $R_p = |r|^2$.
    pub reflectance: f64,
}

/// Reflectance versus incidence angle for one stack configuration.
///
/// `reflectance[i]` is `None` when the engine reported a singular point at
/// `angles_deg[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflectanceCurve {
    pub angles_deg: Vec<f64>,
    pub reflectance: Vec<Option<f64>>,
}

impl ReflectanceCurve {
    /// The `(angle, reflectance)` samples that are defined, in grid order.
    pub fn defined(&self) -> (Vec<f64>, Vec<f64>) {
        defined_samples(&self.angles_deg, &self.reflectance)
    }

    /// Number of singular (undefined) samples.
    pub fn singular_count(&self) -> usize {
        self.reflectance.iter().filter(|r| r.is_none()).count()
    }

    /// Smallest defined reflectance value.
    pub fn min_reflectance(&self) -> Option<f64> {
        self.reflectance.iter().flatten().copied().reduce(f64::min)
    }
}

/// Reflectance versus wavelength at a fixed incidence angle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralCurve {
    pub angle_deg: f64,
    pub wavelengths_nm: Vec<f64>,
    pub reflectance: Vec<Option<f64>>,
}

impl SpectralCurve {
    /// The `(wavelength, reflectance)` samples that are defined.
    pub fn defined(&self) -> (Vec<f64>, Vec<f64>) {
        defined_samples(&self.wavelengths_nm, &self.reflectance)
    }
}

fn defined_samples(xs: &[f64], ys: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    xs.iter()
        .zip(ys)
        .filter_map(|(&x, y)| y.map(|y| (x, y)))
        .unzip()
}
