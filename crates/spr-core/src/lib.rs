//! # SPR Core
//!
//! The numerical backbone of the SPR sensor simulator. This crate computes
//! the p-polarised reflectance of planar multilayers with the transfer-matrix
//! method and reduces reflectance curves to sensor figures of merit.
//!
//! ## Architecture
//!
//! Reflectance engines implement the [`solver::ReflectanceSolver`] trait. The
//! implementation used everywhere is the characteristic-matrix method
//! ([`solver::tmm::TransferMatrixSolver`]). Everything above it (sweeps,
//! resonance location, linewidths, metrics) only consumes its output.
//!
//! ## Modules
//!
//! - [`types`]: layer stacks, Fresnel coefficients, reflectance curves.
//! - [`solver`]: solver trait and transfer-matrix implementation.
//! - [`sweep`]: angular and spectral sweeps over a fixed stack.
//! - [`resonance`]: coarse and spline-refined resonance locators.
//! - [`linewidth`]: FWHM of a reflectance dip.
//! - [`merit`]: sensitivity, χ and Q (empirical and theoretical).
//! - [`orchestrator`]: metal × analyte × thickness sweeps.
//! - [`field`]: evanescent field profile through the stack.

pub mod field;
pub mod linewidth;
pub mod merit;
pub mod orchestrator;
pub mod resonance;
pub mod solver;
pub mod sweep;
pub mod types;
