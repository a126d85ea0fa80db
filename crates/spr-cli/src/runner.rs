//! Job runner: ties together materials, sweeps and exports.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use spr_core::field::{magnetic_field_profile, FieldProfile};
use spr_core::merit::FigureOfMeritSeries;
use spr_core::orchestrator::{
    build_stack, run_reference, run_study, ReferenceEntry, RunKey, Study, SweepPlan, SweepResults,
    SweepSettings,
};
use spr_core::resonance::{locate, locate_spectral};
use spr_core::solver::tmm::TransferMatrixSolver;
use spr_core::sweep::{angular_sweep, spectral_sweep};
use spr_core::types::{LayerStack, SpectralCurve};
use spr_materials::MaterialTable;

use crate::config::{FieldConfig, JobConfig, Mode, SpectralConfig};

/// Marker written for quantities that could not be computed.
pub const UNDEFINED: &str = "undefined";

/// What a job produced.
#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum JobOutput {
    Study {
        study: Study,
    },
    Reference {
        results: SweepResults,
        entries: Vec<ReferenceEntry>,
    },
}

/// Optional extras computed alongside the main sweep.
#[derive(Debug, Default, Serialize)]
pub struct Extras {
    #[serde(serialize_with = "serialize_keyed")]
    pub fields: BTreeMap<RunKey, FieldProfile>,
    #[serde(serialize_with = "serialize_keyed")]
    pub spectra: BTreeMap<RunKey, SpectralRun>,
}

/// A wavelength sweep and the resonance wavelength located on it.
#[derive(Debug, Clone, Serialize)]
pub struct SpectralRun {
    pub curve: SpectralCurve,
    pub resonance_nm: Option<f64>,
}

fn serialize_keyed<S, V>(map: &BTreeMap<RunKey, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    V: Serialize,
{
    serializer.collect_map(map.iter().map(|(k, v)| (k.to_string(), v)))
}

/// Run a validated job.
pub fn run_job(job: &JobConfig) -> Result<(JobOutput, Extras)> {
    let table = job.material_table()?;
    let plan = job.sweep_plan(&table)?;
    let settings = job.sweep_settings()?;
    let solver = TransferMatrixSolver::new();

    println!(
        "  Substrate: {} | metals: {} | analytes: {}",
        plan.substrate,
        plan.metals.join(", "),
        plan.analytes
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  λ = {:.1} nm, {} angles ({:.2}°–{:.2}°), {} thickness(es)",
        job.simulation.wavelength_nm,
        settings.angles.len(),
        settings.angles.degrees().first().copied().unwrap_or_default(),
        settings.angles.degrees().last().copied().unwrap_or_default(),
        plan.thicknesses_nm.len()
    );

    let output = match job.simulation.mode {
        Mode::Analysis | Mode::Comparison => {
            let pair = job.sensing_pair(&plan.analytes)?;
            let study = run_study(&solver, &table, &plan, &settings, &pair)?;
            for (metal, fom) in &study.figures {
                print_summary(metal, fom);
            }
            JobOutput::Study { study }
        }
        Mode::Reference => {
            let reference = job
                .reference
                .as_ref()
                .context("reference mode needs a [reference] section")?;
            let (results, entries) = run_reference(
                &solver,
                &table,
                &plan,
                &settings,
                reference.thickness_nm,
                reference.offset,
            )?;
            for e in &entries {
                println!(
                    "  {:<4} {:<12} {:<6} n = {:.4}  θ_res = {}",
                    e.metal,
                    e.group,
                    e.level.as_str(),
                    e.n_analyte,
                    fmt_opt(e.theta_res_deg, 4)
                );
            }
            JobOutput::Reference { results, entries }
        }
    };

    let mut extras = Extras::default();
    if let Some(field) = &job.field {
        extras.fields = field_profiles(&table, &plan, &settings, field)?;
    }
    if let Some(spectral) = &job.spectral {
        extras.spectra = spectral_curves(&table, &plan, &settings, spectral)?;
    }

    Ok((output, extras))
}

fn print_summary(metal: &str, fom: &FigureOfMeritSeries) {
    for (i, d) in fom.thicknesses_nm.iter().enumerate() {
        println!(
            "  {metal:<4} d = {d:>5.1} nm: θ_res = {}°, FWHM = {}°, S = {} °/RIU, χ = {}, Q = {}",
            fmt_opt(fom.theta_res_deg[i], 3),
            fmt_opt(fom.fwhm_deg[i], 3),
            fmt_opt(fom.sensitivity_empirical[i], 2),
            fmt_opt(fom.chi_empirical[i], 2),
            fmt_opt(fom.q_empirical[i], 2),
        );
    }
}

/// Field profile of every metal/analyte pair at its resonance angle.
fn field_profiles(
    table: &MaterialTable,
    plan: &SweepPlan,
    settings: &SweepSettings,
    field: &FieldConfig,
) -> Result<BTreeMap<RunKey, FieldProfile>> {
    let depths_m: Vec<f64> = field.depth_nm.values()?.iter().map(|z| z * 1e-9).collect();
    let mut profiles = BTreeMap::new();
    for_each_stack(table, plan, settings, field.thickness_nm, |key, stack| {
        let curve = angular_sweep(&TransferMatrixSolver, stack, settings.wavelength_m, &settings.angles)?;
        let Some(theta_deg) = locate(settings.resonance, &curve) else {
            log::warn!("{key}: no resonance, field profile skipped");
            return Ok(());
        };
        let profile =
            magnetic_field_profile(stack, theta_deg.to_radians(), settings.wavelength_m, &depths_m)?;
        profiles.insert(key, profile);
        Ok(())
    })?;
    Ok(profiles)
}

/// Wavelength sweeps of every metal/analyte pair at a fixed angle.
fn spectral_curves(
    table: &MaterialTable,
    plan: &SweepPlan,
    settings: &SweepSettings,
    spectral: &SpectralConfig,
) -> Result<BTreeMap<RunKey, SpectralRun>> {
    let wavelengths_m: Vec<f64> = spectral
        .wavelengths_nm
        .values()?
        .iter()
        .map(|w| w * 1e-9)
        .collect();
    let theta = spectral.angle_deg.to_radians();
    let mut curves = BTreeMap::new();
    for_each_stack(table, plan, settings, spectral.thickness_nm, |key, stack| {
        let curve = spectral_sweep(&TransferMatrixSolver, stack, theta, &wavelengths_m)?;
        let resonance_nm = locate_spectral(settings.resonance, &curve);
        println!(
            "  {key} at θ = {:.2}°: λ_res = {} nm",
            spectral.angle_deg,
            fmt_opt(resonance_nm, 3)
        );
        curves.insert(key, SpectralRun { curve, resonance_nm });
        Ok(())
    })?;
    Ok(curves)
}

/// Build the stack of each metal/analyte pair at one metal thickness.
fn for_each_stack<F>(
    table: &MaterialTable,
    plan: &SweepPlan,
    settings: &SweepSettings,
    thickness_nm: f64,
    mut f: F,
) -> Result<()>
where
    F: FnMut(RunKey, &LayerStack) -> Result<()>,
{
    let wl = settings.wavelength_nm();
    let substrate = table.index(&plan.substrate, wl)?;
    let adhesion = match &plan.adhesion {
        Some(a) => Some((table.index(&a.material, wl)?, a.thickness_nm)),
        None => None,
    };
    for metal in &plan.metals {
        let metal_index = table.index(metal, wl)?;
        for analyte in &plan.analytes {
            let stack = build_stack(substrate, adhesion, metal_index, thickness_nm, analyte.index)?;
            f(RunKey::new(metal.as_str(), analyte.name.as_str()), &stack)?;
        }
    }
    Ok(())
}

/// Format an optional value, writing [`UNDEFINED`] for `None`.
pub fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => UNDEFINED.to_string(),
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write one metal's figure-of-merit series to CSV.
pub fn write_figures_csv(metal: &str, fom: &FigureOfMeritSeries, path: &Path) -> Result<()> {
    let mut file = create(path)?;

    writeln!(file, "# SPR sensor figures of merit: {metal}")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        file,
        "# Theta_spr_theoretical_deg: {}",
        fmt_opt(fom.theta_spr_theoretical_deg, 6)
    )?;
    writeln!(file, "#")?;
    writeln!(
        file,
        "Metal_Thickness_nm,Theta_res_deg,FWHM_deg,FWHM_nm,\
         Sensitivity_Empirical_deg_per_RIU,Chi_Empirical,Q_Empirical,\
         Sensitivity_Theoretical_deg_per_RIU,Chi_Theoretical,Q_Theoretical,\
         Sensitivity_Spectral_nm_per_RIU,Chi_Spectral"
    )?;

    for (i, d) in fom.thicknesses_nm.iter().enumerate() {
        writeln!(
            file,
            "{:.2},{},{},{},{},{},{},{},{},{},{},{}",
            d,
            fmt_opt(fom.theta_res_deg[i], 6),
            fmt_opt(fom.fwhm_deg[i], 6),
            fmt_opt(fom.fwhm_nm[i], 6),
            fmt_opt(fom.sensitivity_empirical[i], 6),
            fmt_opt(fom.chi_empirical[i], 6),
            fmt_opt(fom.q_empirical[i], 6),
            fmt_opt(fom.sensitivity_theoretical[i], 6),
            fmt_opt(fom.chi_theoretical[i], 6),
            fmt_opt(fom.q_theoretical[i], 6),
            fmt_opt(fom.sensitivity_spectral[i], 6),
            fmt_opt(fom.chi_spectral[i], 6),
        )?;
    }
    file.flush()?;

    println!("Figures of merit written to: {}", path.display());
    Ok(())
}

/// Write the reflectance curves of one metal/analyte pair, one column per thickness.
pub fn write_curves_csv(results: &SweepResults, key: &RunKey, path: &Path) -> Result<()> {
    let run = results
        .runs
        .get(key)
        .with_context(|| format!("no results for {key}"))?;
    let mut file = create(path)?;

    writeln!(file, "# Reflectance curves: substrate {}, {key}", results.substrate)?;
    writeln!(file, "# wavelength_nm: {:.3}", results.wavelength_m * 1e9)?;
    for record in &run.records {
        writeln!(
            file,
            "# d = {:.2} nm: theta_res_deg = {}, fwhm_deg = {}",
            record.thickness_nm,
            fmt_opt(record.theta_res_deg, 6),
            fmt_opt(record.fwhm_deg(), 6)
        )?;
    }
    writeln!(file, "#")?;

    let header: Vec<String> = results
        .thicknesses_nm
        .iter()
        .map(|d| format!("R_{d:.2}nm"))
        .collect();
    writeln!(file, "theta_deg,{}", header.join(","))?;

    for (i, theta) in results.angles_deg.iter().enumerate() {
        let row: Vec<String> = run
            .curves
            .iter()
            .map(|c| fmt_opt(c.reflectance[i], 8))
            .collect();
        writeln!(file, "{theta:.4},{}", row.join(","))?;
    }
    file.flush()?;
    Ok(())
}

/// Write the resonance angle of every reference-ladder rung.
pub fn write_reference_csv(entries: &[ReferenceEntry], path: &Path) -> Result<()> {
    let mut file = create(path)?;
    writeln!(file, "Metal,Group,Level,n_analyte_RIU,Theta_res_deg")?;
    for e in entries {
        writeln!(
            file,
            "{},{},{},{:.4},{}",
            e.metal,
            e.group,
            e.level.as_str(),
            e.n_analyte,
            fmt_opt(e.theta_res_deg, 6)
        )?;
    }
    file.flush()?;
    println!("Reference angles written to: {}", path.display());
    Ok(())
}

/// Write a normalised field profile.
pub fn write_field_csv(profile: &FieldProfile, path: &Path) -> Result<()> {
    let mut file = create(path)?;
    writeln!(file, "# |H_y|^2 at theta = {:.4} deg, normalised to 1", profile.theta_deg)?;
    let interfaces: Vec<String> = profile.interfaces_nm.iter().map(|z| format!("{z:.2}")).collect();
    writeln!(file, "# interfaces_nm: 0.00,{}", interfaces.join(","))?;
    writeln!(file, "#")?;
    writeln!(file, "z_nm,intensity")?;
    for (z, v) in profile.depth_nm.iter().zip(&profile.intensity) {
        writeln!(file, "{z:.4},{v:.6e}")?;
    }
    file.flush()?;
    Ok(())
}

/// Write a reflectance-versus-wavelength curve with its resonance wavelength.
pub fn write_spectral_csv(run: &SpectralRun, path: &Path) -> Result<()> {
    let curve = &run.curve;
    let mut file = create(path)?;
    writeln!(file, "# Reflectance at theta = {:.4} deg", curve.angle_deg)?;
    writeln!(file, "# resonance_wavelength_nm: {}", fmt_opt(run.resonance_nm, 6))?;
    writeln!(file, "wavelength_nm,reflectance")?;
    for (w, r) in curve.wavelengths_nm.iter().zip(&curve.reflectance) {
        writeln!(file, "{w:.4},{}", fmt_opt(*r, 8))?;
    }
    file.flush()?;
    Ok(())
}

/// Write any serialisable result to pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, value).context("JSON serialisation error")?;
    println!("Results (JSON) written to: {}", path.display());
    Ok(())
}

/// File-name-safe form of a run key.
pub fn file_stem(key: &RunKey) -> String {
    format!("{}_{}", key.metal, key.analyte)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Write every export the job asked for into `out_dir`.
pub fn write_outputs(job: &JobConfig, output: &JobOutput, extras: &Extras, out_dir: &Path) -> Result<()> {
    match output {
        JobOutput::Study { study } => {
            for (metal, fom) in &study.figures {
                write_figures_csv(metal, fom, &out_dir.join(format!("figures_{metal}.csv")))?;
            }
            if job.output.save_curves {
                for key in study.results.runs.keys() {
                    let path = out_dir.join(format!("curves_{}.csv", file_stem(key)));
                    write_curves_csv(&study.results, key, &path)?;
                }
                println!("Reflectance curves written to: {}", out_dir.display());
            }
        }
        JobOutput::Reference { results, entries } => {
            write_reference_csv(entries, &out_dir.join("reference_theta_res.csv"))?;
            if job.output.save_curves {
                for key in results.runs.keys() {
                    let path = out_dir.join(format!("reference_curve_{}.csv", file_stem(key)));
                    write_curves_csv(results, key, &path)?;
                }
            }
        }
    }

    for (key, profile) in &extras.fields {
        write_field_csv(profile, &out_dir.join(format!("field_{}.csv", file_stem(key))))?;
    }
    for (key, run) in &extras.spectra {
        write_spectral_csv(run, &out_dir.join(format!("spectral_{}.csv", file_stem(key))))?;
    }

    if job.output.save_json {
        #[derive(Serialize)]
        struct Everything<'a> {
            result: &'a JobOutput,
            extras: &'a Extras,
        }
        let everything = Everything {
            result: output,
            extras,
        };
        write_json(&everything, &out_dir.join("results.json"))?;
    }
    Ok(())
}
