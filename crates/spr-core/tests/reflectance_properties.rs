//! Physical sanity checks of the transfer-matrix engine.

use approx::assert_abs_diff_eq;
use num_complex::Complex64;
use spr_core::merit::theoretical_resonance_angle;
use spr_core::resonance::{locate, locate_spectral, ResonanceMethod};
use spr_core::solver::tmm::TransferMatrixSolver;
use spr_core::solver::ReflectanceSolver;
use spr_core::sweep::{angular_sweep, spectral_sweep, AngleGrid};
use spr_core::types::LayerStack;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

#[test]
fn test_identical_media_do_not_reflect() {
    let stack = LayerStack::new(vec![c(1.5, 0.0), c(1.5, 0.0)], vec![]).unwrap();
    for deg in (0..90).step_by(5) {
        let res = TransferMatrixSolver
            .reflect(&stack, (deg as f64).to_radians(), 633e-9)
            .unwrap();
        assert_abs_diff_eq!(res.reflectance, 0.0, epsilon = 1e-20);
        assert_abs_diff_eq!((res.t - 1.0).norm(), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_total_internal_reflection_beyond_critical_angle() {
    let (n1, n2) = (1.5, 1.0);
    let stack = LayerStack::new(vec![c(n1, 0.0), c(n2, 0.0)], vec![]).unwrap();
    let critical = (n2 / n1).asin().to_degrees();

    let grid = AngleGrid::stepped(0.0, 89.9, 0.1).unwrap();
    let curve = angular_sweep(&TransferMatrixSolver, &stack, 633e-9, &grid).unwrap();
    for (deg, r) in curve.angles_deg.iter().zip(&curve.reflectance) {
        let r = r.unwrap();
        if *deg > critical + 1e-9 {
            assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
        } else {
            assert!(r < 1.0, "θ = {deg}: R = {r}");
        }
    }
}

#[test]
fn test_reflectance_within_energy_bound() {
    let cr = c(3.2408, 3.4963);
    let metals = [c(0.040, 5.3194), c(0.16408, 5.3194), c(0.27630, 5.4197), c(0.1325, 4.0203)];
    let grid = AngleGrid::stepped(0.0, 89.5, 0.5).unwrap();
    for substrate in [1.4835, 1.5688, 1.5548, 1.732] {
        for metal in metals {
            for d_nm in [0.0, 10.0, 43.0, 55.0, 200.0] {
                let stack = LayerStack::builder(c(substrate, 0.0))
                    .layer(cr, 2e-9)
                    .layer(metal, d_nm * 1e-9)
                    .exit(c(1.3290, 2.93e-7))
                    .unwrap();
                for wl in [633e-9, 850e-9] {
                    let curve = angular_sweep(&TransferMatrixSolver, &stack, wl, &grid).unwrap();
                    for r in curve.reflectance.iter().flatten() {
                        assert!((-1e-9..=1.0 + 1e-9).contains(r), "R = {r}");
                    }
                }
            }
        }
    }
}

#[test]
fn test_layer_order_matters() {
    let au = c(0.16408, 5.3194);
    let tio2 = c(2.48, 0.0);
    let forward = LayerStack::builder(c(1.5548, 0.0))
        .layer(tio2, 20e-9)
        .layer(au, 50e-9)
        .exit(c(1.3492, 0.0))
        .unwrap();
    let reversed = LayerStack::builder(c(1.5548, 0.0))
        .layer(au, 50e-9)
        .layer(tio2, 20e-9)
        .exit(c(1.3492, 0.0))
        .unwrap();
    let theta = 66.0_f64.to_radians();
    let a = TransferMatrixSolver.reflect(&forward, theta, 850e-9).unwrap();
    let b = TransferMatrixSolver.reflect(&reversed, theta, 850e-9).unwrap();
    assert!((a.reflectance - b.reflectance).abs() > 1e-3);
}

#[test]
fn test_repeated_evaluation_is_bit_identical() {
    let stack = LayerStack::new(
        vec![c(1.732, 0.0), c(0.1325, 4.0203), c(1.335, 0.0)],
        vec![43e-9],
    )
    .unwrap();
    let theta = 0.95;
    let a = TransferMatrixSolver.reflect(&stack, theta, 633e-9).unwrap();
    let b = TransferMatrixSolver.reflect(&stack, theta, 633e-9).unwrap();
    assert_eq!(a, b);
}

/// Silver film on a high-index prism, 633 nm, 40°–80° in 0.1° steps.
#[test]
fn test_single_silver_film_resonance() {
    let silver = c(0.1325, 4.0203);
    let stack = LayerStack::new(vec![c(1.732, 0.0), silver, c(1.335, 0.0)], vec![43e-9]).unwrap();
    let grid = AngleGrid::stepped(40.0, 80.0, 0.1).unwrap();
    assert_eq!(grid.len(), 401);

    let curve = angular_sweep(&TransferMatrixSolver, &stack, 633e-9, &grid).unwrap();
    assert_eq!(curve.singular_count(), 0);
    let (angles, r) = curve.defined();

    let theta_res = locate(ResonanceMethod::Coarse, &curve).unwrap();
    let r_min = curve.min_reflectance().unwrap();
    assert!(r_min < 0.1, "R_min = {r_min}");

    // One pronounced dip: every other local minimum stays well above it.
    let deep_minima: Vec<f64> = (1..r.len() - 1)
        .filter(|&i| r[i] < r[i - 1] && r[i] < r[i + 1] && r[i] < 0.5)
        .map(|i| angles[i])
        .collect();
    assert_eq!(deep_minima, vec![theta_res]);

    // The dip sits at the surface-plasmon coupling angle.
    let eps_mr = (silver * silver).re;
    let theta_spr = theoretical_resonance_angle(eps_mr, 1.335, 1.732).unwrap();
    assert_abs_diff_eq!(theta_res, theta_spr, epsilon = 0.5);

    let smooth = locate(ResonanceMethod::Smooth, &curve).unwrap();
    assert_abs_diff_eq!(smooth, theta_res, epsilon = 0.1);
}

/// Wavelength interrogation: silver film on BK7-like glass at a fixed 72°.
#[test]
fn test_spectral_resonance_wavelength() {
    let stack = LayerStack::new(
        vec![c(1.4874, 0.0), c(0.13544, 3.882), c(1.331, 0.0)],
        vec![50e-9],
    )
    .unwrap();
    let wavelengths_m: Vec<f64> = (0..=2400).map(|i| (300.0 + 0.5 * i as f64) * 1e-9).collect();
    let curve = spectral_sweep(&TransferMatrixSolver, &stack, 72.0_f64.to_radians(), &wavelengths_m).unwrap();
    assert_eq!(curve.wavelengths_nm.len(), 2401);

    let coarse = locate_spectral(ResonanceMethod::Coarse, &curve).unwrap();
    assert_abs_diff_eq!(coarse, 662.5, epsilon = 1e-6);
    assert!(curve.reflectance.iter().flatten().all(|r| *r > 0.0079));

    let smooth = locate_spectral(ResonanceMethod::Smooth, &curve).unwrap();
    assert_abs_diff_eq!(smooth, 662.35, epsilon = 0.05);
}
