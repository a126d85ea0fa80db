//! Metal × analyte × thickness sweeps.
//!
//! For every metal and analyte in a [`SweepPlan`], each metal thickness is
//! turned into a stack `substrate | [adhesion] | metal | analyte`, swept over
//! the angle grid and reduced to a resonance angle and linewidth. Thickness
//! points are evaluated in parallel and collected in plan order, so
//! `records[i]` always belongs to `thicknesses_nm[i]`.
//!
//! Configuration problems (unknown material, bad wavelength, malformed plan)
//! abort the run before any computation. Numerical problems at a single point
//! are recorded as `None` and the sweep carries on.

use std::collections::BTreeMap;
use std::fmt;

use num_complex::Complex64;
use rayon::prelude::*;
use serde::Serialize;
use spr_materials::{MaterialError, MaterialTable};
use thiserror::Error;

use crate::linewidth::{fwhm, Linewidth};
use crate::merit::{figures_of_merit, FigureOfMeritSeries, SensingPair};
use crate::resonance::{locate, ResonanceMethod};
use crate::solver::{check_wavelength, ReflectanceSolver, SolverError};
use crate::sweep::{angular_sweep, AngleGrid};
use crate::types::{LayerStack, ReflectanceCurve};

/// Fatal errors of a sweep run.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Material error: {0}")]
    Material(#[from] MaterialError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Invalid sweep plan: {0}")]
    InvalidPlan(String),
}

/// A named semi-infinite analyte medium.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analyte {
    pub name: String,
    pub index: Complex64,
}

impl Analyte {
    pub fn new(name: impl Into<String>, index: Complex64) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Lossless analyte with a real index.
    pub fn real(name: impl Into<String>, n: f64) -> Self {
        Self::new(name, Complex64::new(n, 0.0))
    }
}

/// Thin adhesion film between the substrate and the metal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdhesionLayer {
    pub material: String,
    pub thickness_nm: f64,
}

/// Which structures to simulate.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    /// Incidence medium (prism or waveguide substrate).
    pub substrate: String,
    pub metals: Vec<String>,
    pub analytes: Vec<Analyte>,
    pub thicknesses_nm: Vec<f64>,
    pub adhesion: Option<AdhesionLayer>,
}

/// How each structure is interrogated.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    /// Vacuum wavelength in meters.
    pub wavelength_m: f64,
    pub angles: AngleGrid,
    pub resonance: ResonanceMethod,
}

impl SweepSettings {
    pub fn wavelength_nm(&self) -> f64 {
        self.wavelength_m * 1e9
    }
}

/// Composite `(metal, analyte)` key of the results map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RunKey {
    pub metal: String,
    pub analyte: String,
}

impl RunKey {
    pub fn new(metal: impl Into<String>, analyte: impl Into<String>) -> Self {
        Self {
            metal: metal.into(),
            analyte: analyte.into(),
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.metal, self.analyte)
    }
}

/// Resonance summary of one reflectance curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResonanceRecord {
    pub thickness_nm: f64,
    pub theta_res_deg: Option<f64>,
    pub fwhm: Option<Linewidth>,
    pub min_reflectance: Option<f64>,
}

impl ResonanceRecord {
    pub fn fwhm_deg(&self) -> Option<f64> {
        self.fwhm.map(|lw| lw.width_deg)
    }
}

/// Curves and resonance records of one `(metal, analyte)` pair, aligned with
/// the plan's thickness sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSeries {
    pub curves: Vec<ReflectanceCurve>,
    pub records: Vec<ResonanceRecord>,
}

impl RunSeries {
    pub fn theta_res_deg(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.theta_res_deg).collect()
    }

    pub fn fwhm_deg(&self) -> Vec<Option<f64>> {
        self.records.iter().map(ResonanceRecord::fwhm_deg).collect()
    }
}

/// Everything produced by [`run_sweep`].
#[derive(Debug, Clone, Serialize)]
pub struct SweepResults {
    pub substrate: String,
    pub substrate_index: Complex64,
    pub metal_indices: BTreeMap<String, Complex64>,
    pub analytes: Vec<Analyte>,
    pub wavelength_m: f64,
    pub angles_deg: Vec<f64>,
    pub thicknesses_nm: Vec<f64>,
    #[serde(serialize_with = "serialize_runs")]
    pub runs: BTreeMap<RunKey, RunSeries>,
}

impl SweepResults {
    pub fn run(&self, metal: &str, analyte: &str) -> Option<&RunSeries> {
        self.runs.get(&RunKey::new(metal, analyte))
    }

    pub fn analyte(&self, name: &str) -> Option<&Analyte> {
        self.analytes.iter().find(|a| a.name == name)
    }

    pub fn metals(&self) -> impl Iterator<Item = &str> {
        self.metal_indices.keys().map(String::as_str)
    }
}

/// JSON object keys must be strings.
fn serialize_runs<S>(runs: &BTreeMap<RunKey, RunSeries>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_map(runs.iter().map(|(k, v)| (k.to_string(), v)))
}

/// A sweep together with the figures of merit derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct Study {
    pub results: SweepResults,
    pub figures: BTreeMap<String, FigureOfMeritSeries>,
}

/// Stack `substrate | [adhesion] | metal | analyte` for one metal thickness.
pub fn build_stack(
    substrate: Complex64,
    adhesion: Option<(Complex64, f64)>,
    metal: Complex64,
    metal_thickness_nm: f64,
    analyte: Complex64,
) -> Result<LayerStack, SolverError> {
    let mut builder = LayerStack::builder(substrate);
    if let Some((index, thickness_nm)) = adhesion {
        builder = builder.layer(index, thickness_nm * 1e-9);
    }
    builder
        .layer(metal, metal_thickness_nm * 1e-9)
        .exit(analyte)
}

/// Run every `(metal, analyte, thickness)` combination of `plan`.
pub fn run_sweep<S: ReflectanceSolver + ?Sized>(
    solver: &S,
    materials: &MaterialTable,
    plan: &SweepPlan,
    settings: &SweepSettings,
) -> Result<SweepResults, SweepError> {
    validate_plan(plan)?;
    check_wavelength(settings.wavelength_m)?;

    let wavelength_nm = settings.wavelength_nm();
    let substrate_index = materials.index(&plan.substrate, wavelength_nm)?;
    let adhesion = plan
        .adhesion
        .as_ref()
        .map(|a| Ok::<_, MaterialError>((materials.index(&a.material, wavelength_nm)?, a.thickness_nm)))
        .transpose()?;
    let metal_indices = plan
        .metals
        .iter()
        .map(|m| Ok((m.clone(), materials.index(m, wavelength_nm)?)))
        .collect::<Result<BTreeMap<_, _>, MaterialError>>()?;

    log::info!(
        "{}: {} metal(s) × {} analyte(s) × {} thickness(es) over {} angles at {:.1} nm",
        solver.method_name(),
        plan.metals.len(),
        plan.analytes.len(),
        plan.thicknesses_nm.len(),
        settings.angles.len(),
        wavelength_nm
    );

    let mut runs = BTreeMap::new();
    for metal in &plan.metals {
        let metal_index = metal_indices[metal];
        for analyte in &plan.analytes {
            let key = RunKey::new(metal.as_str(), analyte.name.as_str());
            let points = plan
                .thicknesses_nm
                .par_iter()
                .map(|&thickness_nm| {
                    let stack = build_stack(
                        substrate_index,
                        adhesion,
                        metal_index,
                        thickness_nm,
                        analyte.index,
                    )?;
                    let curve = angular_sweep(solver, &stack, settings.wavelength_m, &settings.angles)?;
                    let record = summarise(&curve, thickness_nm, settings.resonance);
                    Ok((curve, record))
                })
                .collect::<Result<Vec<_>, SolverError>>()?;

            for (_, record) in &points {
                if record.theta_res_deg.is_none() {
                    log::warn!("{key} at {} nm: no defined reflectance sample", record.thickness_nm);
                } else if record.fwhm.is_none() {
                    log::warn!("{key} at {} nm: FWHM not computable", record.thickness_nm);
                }
            }

            let (curves, records): (Vec<_>, Vec<_>) = points.into_iter().unzip();
            log::debug!("{key}: {} thickness points done", records.len());
            runs.insert(key, RunSeries { curves, records });
        }
    }

    Ok(SweepResults {
        substrate: plan.substrate.clone(),
        substrate_index,
        metal_indices,
        analytes: plan.analytes.clone(),
        wavelength_m: settings.wavelength_m,
        angles_deg: settings.angles.degrees().to_vec(),
        thicknesses_nm: plan.thicknesses_nm.clone(),
        runs,
    })
}

/// Run a sweep and derive the per-metal figures of merit from it.
pub fn run_study<S: ReflectanceSolver + ?Sized>(
    solver: &S,
    materials: &MaterialTable,
    plan: &SweepPlan,
    settings: &SweepSettings,
    pair: &SensingPair,
) -> Result<Study, SweepError> {
    pair.validate(&plan.analytes)?;
    let results = run_sweep(solver, materials, plan, settings)?;
    let figures = figures_of_merit(&results, pair)?;
    Ok(Study { results, figures })
}

/// Position of an analyte in a reference ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LadderLevel {
    Low,
    Center,
    High,
}

impl LadderLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LadderLevel::Low => "low",
            LadderLevel::Center => "center",
            LadderLevel::High => "high",
        }
    }
}

/// One rung of a reference ladder: the centre analyte shifted by `-δ`, `0` or `+δ`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LadderStep {
    pub group: String,
    pub level: LadderLevel,
    pub analyte: Analyte,
}

/// Analytes `n - δ`, `n`, `n + δ` around each centre, in input order.
///
/// Rung names are `<group>_<level>`.
pub fn reference_ladder(centres: &[Analyte], offset: f64) -> Vec<LadderStep> {
    centres
        .iter()
        .flat_map(|centre| {
            [
                (LadderLevel::Low, -offset),
                (LadderLevel::Center, 0.0),
                (LadderLevel::High, offset),
            ]
            .into_iter()
            .map(move |(level, shift)| LadderStep {
                group: centre.name.clone(),
                level,
                analyte: Analyte::new(
                    format!("{}_{}", centre.name, level.as_str()),
                    centre.index + shift,
                ),
            })
        })
        .collect()
}

/// Resonance angle of one ladder rung for one metal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceEntry {
    pub metal: String,
    pub group: String,
    pub level: LadderLevel,
    pub n_analyte: f64,
    pub theta_res_deg: Option<f64>,
}

/// Reference curves: every metal at one fixed thickness against a ladder of
/// analytes, located with the smooth locator.
///
/// `plan.analytes` holds the ladder centres and `plan.thicknesses_nm` is
/// ignored in favour of `thickness_nm`.
pub fn run_reference<S: ReflectanceSolver + ?Sized>(
    solver: &S,
    materials: &MaterialTable,
    plan: &SweepPlan,
    settings: &SweepSettings,
    thickness_nm: f64,
    offset: f64,
) -> Result<(SweepResults, Vec<ReferenceEntry>), SweepError> {
    if !(offset.is_finite() && offset > 0.0) {
        return Err(SweepError::InvalidPlan(format!(
            "reference offset must be positive, got {offset}"
        )));
    }

    let ladder = reference_ladder(&plan.analytes, offset);
    let ladder_plan = SweepPlan {
        analytes: ladder.iter().map(|step| step.analyte.clone()).collect(),
        thicknesses_nm: vec![thickness_nm],
        ..plan.clone()
    };
    let ladder_settings = SweepSettings {
        resonance: ResonanceMethod::Smooth,
        ..settings.clone()
    };
    let results = run_sweep(solver, materials, &ladder_plan, &ladder_settings)?;

    let entries = plan
        .metals
        .iter()
        .flat_map(|metal| {
            ladder.iter().map(|step| ReferenceEntry {
                metal: metal.clone(),
                group: step.group.clone(),
                level: step.level,
                n_analyte: step.analyte.index.re,
                theta_res_deg: results
                    .run(metal, &step.analyte.name)
                    .and_then(|run| run.records.first())
                    .and_then(|r| r.theta_res_deg),
            })
        })
        .collect();

    Ok((results, entries))
}

fn summarise(curve: &ReflectanceCurve, thickness_nm: f64, method: ResonanceMethod) -> ResonanceRecord {
    let (angles, reflectance) = curve.defined();
    ResonanceRecord {
        thickness_nm,
        theta_res_deg: locate(method, curve),
        fwhm: fwhm(&reflectance, &angles),
        min_reflectance: curve.min_reflectance(),
    }
}

fn validate_plan(plan: &SweepPlan) -> Result<(), SweepError> {
    let invalid = |msg: String| Err(SweepError::InvalidPlan(msg));

    if plan.metals.is_empty() {
        return invalid("no metals selected".into());
    }
    if plan.analytes.is_empty() {
        return invalid("no analytes selected".into());
    }
    if plan.thicknesses_nm.is_empty() {
        return invalid("thickness sweep is empty".into());
    }
    if let Some(d) = plan
        .thicknesses_nm
        .iter()
        .find(|d| !d.is_finite() || **d < 0.0)
    {
        return invalid(format!("metal thickness must be finite and non-negative, got {d}"));
    }
    if let Some(a) = &plan.adhesion {
        if !a.thickness_nm.is_finite() || a.thickness_nm < 0.0 {
            return invalid(format!(
                "adhesion thickness must be finite and non-negative, got {}",
                a.thickness_nm
            ));
        }
    }
    for (i, analyte) in plan.analytes.iter().enumerate() {
        if !analyte.index.is_finite() {
            return invalid(format!("analyte '{}' has a non-finite index", analyte.name));
        }
        if plan.analytes[..i].iter().any(|a| a.name == analyte.name) {
            return invalid(format!("analyte '{}' listed twice", analyte.name));
        }
    }
    for (i, metal) in plan.metals.iter().enumerate() {
        if plan.metals[..i].contains(metal) {
            return invalid(format!("metal '{metal}' listed twice"));
        }
    }
    Ok(())
}
