//! End-to-end sweeps through the orchestrator and the figure-of-merit calculator.

use num_complex::Complex64;
use spr_core::merit::SensingPair;
use spr_core::orchestrator::{run_study, run_sweep, AdhesionLayer, Analyte, SweepPlan, SweepSettings};
use spr_core::resonance::ResonanceMethod;
use spr_core::solver::tmm::TransferMatrixSolver;
use spr_core::sweep::AngleGrid;
use spr_materials::MaterialTable;

fn comparison_plan(thicknesses_nm: Vec<f64>) -> SweepPlan {
    SweepPlan {
        substrate: "TOPAS".into(),
        metals: vec!["Ag".into(), "Au".into(), "Cu".into()],
        analytes: vec![
            Analyte::real("analyte_01", 1.3492),
            Analyte::real("analyte_02", 1.3481),
        ],
        thicknesses_nm,
        adhesion: Some(AdhesionLayer {
            material: "Cr".into(),
            thickness_nm: 2.0,
        }),
    }
}

fn settings(resonance: ResonanceMethod) -> SweepSettings {
    SweepSettings {
        wavelength_m: 850e-9,
        angles: AngleGrid::linspace(58.0, 70.0, 1201).unwrap(),
        resonance,
    }
}

#[test]
fn test_resonance_shifts_smoothly_with_metal_thickness() {
    let table = MaterialTable::reference_850nm();
    let thicknesses: Vec<f64> = (45..=55).map(f64::from).collect();
    let results = run_sweep(
        &TransferMatrixSolver,
        &table,
        &comparison_plan(thicknesses),
        &settings(ResonanceMethod::Smooth),
    )
    .unwrap();

    for metal in ["Ag", "Au", "Cu"] {
        let thetas: Vec<f64> = results
            .run(metal, "analyte_01")
            .unwrap()
            .theta_res_deg()
            .into_iter()
            .map(Option::unwrap)
            .collect();
        assert_eq!(thetas.len(), 11);
        for w in thetas.windows(2) {
            let step = w[1] - w[0];
            // Thicker films pull the dip slightly towards smaller angles, without jumps.
            assert!(step < 1e-3 && step > -0.1, "{metal}: {thetas:?}");
        }
    }
}

#[test]
fn test_comparison_study_figures_of_merit() {
    let table = MaterialTable::reference_850nm();
    let pair = SensingPair::new("analyte_02", "analyte_01", "analyte_01");
    let study = run_study(
        &TransferMatrixSolver,
        &table,
        &comparison_plan(vec![45.0, 50.0, 55.0]),
        &settings(ResonanceMethod::Smooth),
        &pair,
    )
    .unwrap();

    assert_eq!(study.figures.len(), 3);
    for (metal, fom) in &study.figures {
        assert_eq!(fom.thicknesses_nm, vec![45.0, 50.0, 55.0]);
        assert_eq!(fom.sensitivity_empirical.len(), 3);
        assert_eq!(fom.q_theoretical.len(), 3);

        let s_theo = fom.sensitivity_theoretical[0].unwrap();
        assert!(fom.sensitivity_theoretical.iter().all(|s| *s == Some(s_theo)));
        assert!(fom.theta_spr_theoretical_deg.is_some());

        for i in 0..3 {
            let s = fom.sensitivity_empirical[i].unwrap();
            assert!(s > 0.0, "{metal}: S = {s}");
            assert!((s - s_theo).abs() / s_theo < 0.3, "{metal}: S = {s}, S_theo = {s_theo}");
            assert!(fom.sensitivity_spectral[i].unwrap() > 0.0);

            let width = fom.fwhm_deg[i].unwrap();
            assert!(width > 0.0);
            let q = fom.q_empirical[i].unwrap();
            assert!((q - fom.theta_res_deg[i].unwrap() / width).abs() < 1e-9);
            assert!(fom.chi_empirical[i].unwrap() > 0.0);
            assert!(fom.chi_theoretical[i].unwrap() > 0.0);
            assert!(fom.fwhm_nm[i].unwrap() > 0.0);
            assert!(fom.chi_spectral[i].unwrap() > 0.0);
        }
    }

    let json = serde_json::to_value(&study).unwrap();
    assert!(json["results"]["runs"]["Au/analyte_01"]["records"].is_array());
    assert!(json["figures"]["Cu"]["chi_empirical"].is_array());
}

#[test]
fn test_undefined_points_propagate_without_aborting() {
    let table = MaterialTable::reference_850nm();
    let mut plan = comparison_plan(vec![50.0]);
    // Every angle is singular for a zero-index analyte.
    plan.analytes.push(Analyte::new("void", Complex64::new(0.0, 0.0)));
    let pair = SensingPair::new("void", "analyte_01", "void");

    let study = run_study(
        &TransferMatrixSolver,
        &table,
        &plan,
        &settings(ResonanceMethod::Coarse),
        &pair,
    )
    .unwrap();

    for fom in study.figures.values() {
        assert_eq!(fom.theta_res_deg, vec![None]);
        assert_eq!(fom.fwhm_deg, vec![None]);
        assert_eq!(fom.sensitivity_empirical, vec![None]);
        assert_eq!(fom.chi_empirical, vec![None]);
        assert_eq!(fom.q_empirical, vec![None]);
        assert_eq!(fom.chi_theoretical, vec![None]);
    }
    let good = study.results.run("Au", "analyte_01").unwrap();
    assert!(good.records[0].theta_res_deg.is_some());
}

#[test]
fn test_unknown_sensing_analyte_fails_before_sweeping() {
    let table = MaterialTable::reference_850nm();
    let pair = SensingPair::new("analyte_02", "analyte_99", "analyte_01");
    let err = run_study(
        &TransferMatrixSolver,
        &table,
        &comparison_plan(vec![50.0]),
        &settings(ResonanceMethod::Coarse),
        &pair,
    );
    assert!(err.is_err());
}
