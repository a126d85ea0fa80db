//! # SPR Materials
//!
//! Optical constant providers for SPR layer stacks. All materials
//! implement the [`MaterialProvider`](provider::MaterialProvider) trait,
//! which returns the complex refractive index $\tilde{n} = n + ik$ at a
//! given wavelength.
//!
//! ## Available data sources
//!
//! | Source | Module |
//! |--------|--------|
//! | Fixed index at a reference wavelength | [`constant`] |
//! | Tabulated $(\lambda, n, k)$ data | [`tabulated`] |
//! | Named registry with 850 nm reference constants | [`catalog`] |
//!
//! ## Interpolation
//!
//! Tabulated data is interpolated using natural cubic splines
//! ([`spline::CubicSpline`]). The same spline is reused by `spr-core` to
//! refine reflectance minima between angle samples.

pub mod catalog;
pub mod constant;
pub mod provider;
pub mod spline;
pub mod tabulated;

pub use catalog::MaterialTable;
pub use provider::{MaterialError, MaterialProvider};
