//! Evanescent field profile of a layer stack.
//!
//! The tangential magnetic field $H_y$ is normalised to a unit incident wave.
//! At the first interface ($z = 0$) the state vector is
//! $(U, V) = (1 + r,\ q_0 (1 - r))$. Inside film $k$, at a distance $\Delta z$
//! below its top, it is obtained with the inverse characteristic matrix
//!
//! $$
//! \begin{pmatrix} U \\ V \end{pmatrix}(\Delta z) =
//! \begin{pmatrix} \cos\beta & i \sin\beta / q_k \\ i q_k \sin\beta & \cos\beta \end{pmatrix}
//! \begin{pmatrix} U \\ V \end{pmatrix}_{\text{top}},
//! \qquad \beta = k_0 \varepsilon_k \Delta z,
//! $$
//!
//! so the field is continuous across every interface. In the exit medium the
//! field decays as $e^{i k_0 \varepsilon_{N-1} \Delta z}$ on the bounded branch.

use ndarray::{array, Array1};
use num_complex::Complex64;
use serde::Serialize;

use crate::solver::tmm::{characteristic_matrix, StackOptics, TransferMatrixSolver};
use crate::solver::{ReflectanceSolver, SolverError};
use crate::types::LayerStack;

/// Normalised $|H_y|^2$ versus depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProfile {
    pub theta_deg: f64,
    /// Depth below the first interface; negative values lie in the incidence medium.
    pub depth_nm: Vec<f64>,
    /// $|H_y|^2$ scaled so that its maximum over `depth_nm` is 1.
    pub intensity: Vec<f64>,
    /// Depths of the interfaces below the first one (internal layers, then exit).
    pub interfaces_nm: Vec<f64>,
}

/// Field intensity profile of `stack` at one angle and wavelength.
pub fn magnetic_field_profile(
    stack: &LayerStack,
    theta_rad: f64,
    wavelength_m: f64,
    depths_m: &[f64],
) -> Result<FieldProfile, SolverError> {
    if let Some(z) = depths_m.iter().find(|z| !z.is_finite()) {
        return Err(SolverError::InvalidGrid(format!("non-finite depth {z}")));
    }

    let r = TransferMatrixSolver.reflect(stack, theta_rad, wavelength_m)?.r;
    let optics = StackOptics::new(stack, theta_rad, wavelength_m);
    let one = Complex64::new(1.0, 0.0);

    // State vector at the top of each internal layer.
    let mut tops: Vec<(f64, f64, Array1<Complex64>)> = Vec::with_capacity(stack.len() - 2);
    let mut state = array![one + r, optics.q[0] * (one - r)];
    let mut z = 0.0;
    for (i, &d) in stack.thicknesses_m().iter().enumerate() {
        tops.push((z, d, state.clone()));
        state = propagate(&optics, i + 1, d, &state);
        z += d;
    }
    let exit_depth = z;
    let exit_field = state[0];
    let exit = stack.len() - 1;

    let field_at = |depth: f64| -> Complex64 {
        if depth < 0.0 {
            let phase = Complex64::i() * optics.k0 * optics.eps[0] * depth;
            return phase.exp() + r * (-phase).exp();
        }
        for (i, (top, d, s)) in tops.iter().enumerate() {
            if depth < top + d {
                return propagate(&optics, i + 1, depth - top, s)[0];
            }
        }
        let phase = Complex64::i() * optics.k0 * optics.eps[exit] * (depth - exit_depth);
        exit_field * phase.exp()
    };

    let mut intensity: Vec<f64> = depths_m.iter().map(|&z| field_at(z).norm_sqr()).collect();
    let max = intensity.iter().copied().fold(0.0, f64::max);
    if max > 0.0 && max.is_finite() {
        intensity.iter_mut().for_each(|v| *v /= max);
    } else {
        log::warn!("Field profile has no finite maximum; left unnormalised");
    }

    let interfaces_nm = tops
        .iter()
        .skip(1)
        .map(|(top, _, _)| top * 1e9)
        .chain(std::iter::once(exit_depth * 1e9))
        .collect();

    Ok(FieldProfile {
        theta_deg: theta_rad.to_degrees(),
        depth_nm: depths_m.iter().map(|z| z * 1e9).collect(),
        intensity,
        interfaces_nm,
    })
}

/// Intensity decay length ($1/e$ of $|H_y|^2$) into the exit medium, in nm.
///
/// `None` when the exit field propagates rather than decays.
pub fn penetration_depth_nm(
    stack: &LayerStack,
    theta_rad: f64,
    wavelength_m: f64,
) -> Option<f64> {
    let optics = StackOptics::new(stack, theta_rad, wavelength_m);
    let decay = 2.0 * optics.k0 * optics.eps[stack.len() - 1].im;
    (decay > 0.0 && decay.is_finite()).then(|| 1e9 / decay)
}

/// Tangential fields a distance `dz` below the top of medium `k`.
fn propagate(optics: &StackOptics, k: usize, dz: f64, state: &Array1<Complex64>) -> Array1<Complex64> {
    let beta = optics.k0 * dz * optics.eps[k];
    characteristic_matrix(-beta, optics.q[k]).dot(state)
}
