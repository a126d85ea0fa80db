//! Transfer-matrix (characteristic matrix) method for p-polarised light.
//!
//! For a stack of media $0, 1, \dots, N-1$ and an in-plane wavevector fixed
//! by the incidence medium, each layer contributes
//!
//! $$
//! \varepsilon_k = \sqrt{\tilde{n}_k^2 - (\mathrm{Re}\,\tilde{n}_0 \sin\theta)^2},
//! \qquad q_k = \varepsilon_k / \tilde{n}_k^2,
//! \qquad \beta_k = \tfrac{2\pi}{\lambda} d_k \varepsilon_k
//! $$
//!
//! and every internal film is represented by
//!
//! $$
//! M_k = \begin{pmatrix} \cos\beta_k & -i \sin\beta_k / q_k \\
//!                       -i q_k \sin\beta_k & \cos\beta_k \end{pmatrix}.
//! $$
//!
//! The product $M = M_1 M_2 \cdots M_{N-2}$ links the tangential fields at
//! the first and last interfaces, from which $r$ and $t$ follow.
//!
//! # Reference
//! Born & Wolf, *Principles of Optics*, §1.6 (characteristic matrix of a stratified medium).

use ndarray::{array, Array2};
use num_complex::Complex64;

use super::{check_angle, check_wavelength, ReflectanceSolver, SolverError};
use crate::types::{FresnelCoefficients, LayerStack};

/// Transfer-matrix solver for TM (p) polarisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferMatrixSolver;

impl TransferMatrixSolver {
    pub fn new() -> Self {
        Self
    }
}

impl ReflectanceSolver for TransferMatrixSolver {
    fn reflect(
        &self,
        stack: &LayerStack,
        theta_rad: f64,
        wavelength_m: f64,
    ) -> Result<FresnelCoefficients, SolverError> {
        check_wavelength(wavelength_m)?;
        check_angle(theta_rad)?;

        let optics = StackOptics::new(stack, theta_rad, wavelength_m);
        let m = optics.total_matrix(stack);

        let q_in = optics.q[0];
        let q_out = optics.q[stack.len() - 1];
        let a = m[[0, 0]] + m[[0, 1]] * q_out;
        let b = m[[1, 0]] + m[[1, 1]] * q_out;

        let num = a * q_in - b;
        let den = a * q_in + b;

        let theta_deg = theta_rad.to_degrees();
        if !den.is_finite() || den.norm_sqr() == 0.0 {
            return Err(SolverError::Singular { theta_deg });
        }

        let r = num / den;
        let t = 2.0 * q_in / den;
        if !r.is_finite() || !t.is_finite() {
            return Err(SolverError::Singular { theta_deg });
        }

        Ok(FresnelCoefficients {
            r,
            t,
            reflectance: r.norm_sqr(),
        })
    }

    fn method_name(&self) -> &str {
        "Transfer matrix (TM)"
    }
}

/// Per-layer normal wavevector components and admittances for one
/// (stack, angle, wavelength) configuration.
#[derive(Debug, Clone)]
pub(crate) struct StackOptics {
    /// Vacuum wavenumber $2\pi/\lambda$ (m⁻¹).
    pub k0: f64,
    /// $\varepsilon_k$, one per medium, on the decaying branch.
    pub eps: Vec<Complex64>,
    /// TM admittance $q_k$, one per medium.
    pub q: Vec<Complex64>,
}

impl StackOptics {
    pub fn new(stack: &LayerStack, theta_rad: f64, wavelength_m: f64) -> Self {
        let k_par = stack.incidence().re * theta_rad.sin();
        let eps: Vec<Complex64> = stack
            .indices()
            .iter()
            .map(|&n| normal_component(n, k_par))
            .collect();
        let q = eps
            .iter()
            .zip(stack.indices())
            .map(|(&e, &n)| tm_admittance(e, n))
            .collect();
        Self {
            k0: 2.0 * std::f64::consts::PI / wavelength_m,
            eps,
            q,
        }
    }

    /// Characteristic matrix of medium `k` over a thickness `thickness_m`.
    pub fn layer_matrix(&self, k: usize, thickness_m: f64) -> Array2<Complex64> {
        let beta = self.k0 * thickness_m * self.eps[k];
        characteristic_matrix(beta, self.q[k])
    }

    /// Ordered product $M_1 M_2 \cdots M_{N-2}$ (identity without internal layers).
    pub fn total_matrix(&self, stack: &LayerStack) -> Array2<Complex64> {
        stack
            .thicknesses_m()
            .iter()
            .enumerate()
            .fold(Array2::eye(2), |acc, (i, &d)| acc.dot(&self.layer_matrix(i + 1, d)))
    }
}

/// Normal component $\varepsilon = \sqrt{\tilde{n}^2 - k_\parallel^2}$ on the
/// branch with $\mathrm{Im}\,\varepsilon \geq 0$.
///
/// With the $e^{-i\omega t}$ convention and $\tilde{n} = n + ik$, a forward
/// wave $e^{i k_0 \varepsilon z}$ stays bounded as $z \to \infty$ only on this
/// branch. On the real axis (lossless, propagating) the root with
/// $\mathrm{Re}\,\varepsilon \geq 0$ is taken.
pub fn normal_component(n: Complex64, k_par: f64) -> Complex64 {
    let root = (n * n - k_par * k_par).sqrt();
    if root.im < 0.0 || (root.im == 0.0 && root.re < 0.0) {
        -root
    } else {
        root
    }
}

/// TM admittance $q = \varepsilon / \tilde{n}^2$ (non-magnetic media).
pub fn tm_admittance(eps: Complex64, n: Complex64) -> Complex64 {
    eps / (n * n)
}

/// Characteristic matrix of a single film with phase thickness `beta` and admittance `q`.
pub fn characteristic_matrix(beta: Complex64, q: Complex64) -> Array2<Complex64> {
    let i = Complex64::i();
    let (sin_b, cos_b) = (beta.sin(), beta.cos());
    array![[cos_b, -i * sin_b / q], [-i * q * sin_b, cos_b]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_branch_decays_in_absorbing_media() {
        // Metals, lossy dielectrics and evanescent lossless media.
        for n in [c(0.16408, 5.3194), c(3.2408, 3.4963), c(1.3290, 2.93e-7), c(1.0, 0.0)] {
            for k_par in [0.0, 0.5, 1.2, 1.5, 2.0] {
                let eps = normal_component(n, k_par);
                assert!(eps.im >= 0.0, "n={n}, k_par={k_par}: Im(eps)={}", eps.im);
                let check = eps * eps - (n * n - k_par * k_par);
                assert_abs_diff_eq!(check.norm(), 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_branch_with_negative_zero_imaginary_part() {
        // A medium quoted with -0.0 extinction must not flip the evanescent branch.
        let eps = normal_component(c(1.0, -0.0), 1.2);
        assert!(eps.im > 0.0);
        assert_abs_diff_eq!(eps.re, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_characteristic_matrix_is_unimodular() {
        let beta = c(0.7, 0.2);
        let q = c(0.01, -0.05);
        let m = characteristic_matrix(beta, q);
        let det = m[[0, 0]] * m[[1, 1]] - m[[0, 1]] * m[[1, 0]];
        assert_relative_eq!(det.re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(det.im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_layer_matrix_is_branch_invariant() {
        // Flipping the sign of eps changes neither M_k nor R for internal layers.
        let beta = c(1.1, 0.4);
        let q = c(0.3, 0.1);
        let m1 = characteristic_matrix(beta, q);
        let m2 = characteristic_matrix(-beta, -q);
        for (a, b) in m1.iter().zip(m2.iter()) {
            assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_normal_incidence_single_interface() {
        // R = ((n1 - n2)/(n1 + n2))^2 at normal incidence.
        let stack = LayerStack::new(vec![c(1.5, 0.0), c(1.0, 0.0)], vec![]).unwrap();
        let res = TransferMatrixSolver.reflect(&stack, 0.0, 633e-9).unwrap();
        assert_relative_eq!(res.reflectance, 0.04, epsilon = 1e-12);
    }

    #[test]
    fn test_brewster_angle_extinguishes_tm() {
        let (n1, n2) = (1.0, 1.5);
        let stack = LayerStack::new(vec![c(n1, 0.0), c(n2, 0.0)], vec![]).unwrap();
        let brewster = (n2 / n1).atan();
        let res = TransferMatrixSolver.reflect(&stack, brewster, 633e-9).unwrap();
        assert_abs_diff_eq!(res.reflectance, 0.0, epsilon = 1e-20);
    }

    #[test]
    fn test_zero_thickness_film_is_transparent() {
        let bare = LayerStack::new(vec![c(1.732, 0.0), c(1.335, 0.0)], vec![]).unwrap();
        let coated =
            LayerStack::new(vec![c(1.732, 0.0), c(0.1325, 4.0203), c(1.335, 0.0)], vec![0.0]).unwrap();
        let theta = 0.6;
        let a = TransferMatrixSolver.reflect(&bare, theta, 633e-9).unwrap();
        let b = TransferMatrixSolver.reflect(&coated, theta, 633e-9).unwrap();
        assert_abs_diff_eq!((a.r - b.r).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transmission_matches_interface_formula() {
        // For a bare interface t = 2 q0 / (q0 + q1).
        let stack = LayerStack::new(vec![c(1.5, 0.0), c(1.2, 0.0)], vec![]).unwrap();
        let theta = 0.3;
        let optics = StackOptics::new(&stack, theta, 850e-9);
        let expected = 2.0 * optics.q[0] / (optics.q[0] + optics.q[1]);
        let res = TransferMatrixSolver.reflect(&stack, theta, 850e-9).unwrap();
        assert_abs_diff_eq!((res.t - expected).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_index_exit_is_singular() {
        let stack = LayerStack::new(vec![c(1.5, 0.0), c(0.0, 0.0)], vec![]).unwrap();
        let err = TransferMatrixSolver.reflect(&stack, 0.2, 633e-9).unwrap_err();
        assert!(err.is_singular());
    }

    #[test]
    fn test_rejects_invalid_wavelength_and_angle() {
        let stack = LayerStack::new(vec![c(1.5, 0.0), c(1.0, 0.0)], vec![]).unwrap();
        assert_eq!(
            TransferMatrixSolver.reflect(&stack, 0.1, 0.0).unwrap_err(),
            SolverError::InvalidWavelength(0.0)
        );
        assert!(matches!(
            TransferMatrixSolver.reflect(&stack, std::f64::consts::FRAC_PI_2, 633e-9),
            Err(SolverError::InvalidAngle(_))
        ));
        assert!(matches!(
            TransferMatrixSolver.reflect(&stack, -0.1, 633e-9),
            Err(SolverError::InvalidAngle(_))
        ));
    }
}
