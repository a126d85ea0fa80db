//! TOML configuration deserialisation for sweep jobs.

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use num_complex::Complex64;
use serde::Deserialize;
use spr_core::merit::SensingPair;
use spr_core::orchestrator::{AdhesionLayer, Analyte, SweepPlan, SweepSettings};
use spr_core::resonance::ResonanceMethod;
use spr_core::sweep::{self, AngleGrid};
use spr_materials::constant::ConstantMaterial;
use spr_materials::tabulated::TabulatedMaterial;
use spr_materials::MaterialTable;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub simulation: SimulationConfig,
    pub structure: StructureConfig,
    #[serde(default, rename = "analyte")]
    pub analytes: Vec<AnalyteConfig>,
    pub sensing: Option<SensingConfig>,
    pub reference: Option<ReferenceConfig>,
    pub field: Option<FieldConfig>,
    pub spectral: Option<SpectralConfig>,
    #[serde(default, rename = "material")]
    pub materials: Vec<MaterialConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What a job computes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One metal: curves, resonance records and figures of merit.
    #[default]
    Analysis,
    /// Several metals side by side.
    Comparison,
    /// Fixed-thickness reference curves over an analyte ladder.
    Reference,
}

/// Simulation parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub mode: Mode,
    /// Vacuum wavelength in nm.
    pub wavelength_nm: f64,
    #[serde(default)]
    pub resonance: ResonanceMethod,
    /// Incidence angles in degrees.
    pub angles: GridSpec,
}

/// A 1-D grid: a range with a point count or a step, or explicit values.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    Points { range: [f64; 2], points: usize },
    Step { range: [f64; 2], step: f64 },
    Values { values: Vec<f64> },
}

impl GridSpec {
    /// Expand to explicit values (end points inclusive).
    pub fn values(&self) -> Result<Vec<f64>> {
        match self {
            GridSpec::Points { range, points } => {
                ensure!(*points > 0, "grid needs at least one point");
                Ok(sweep::linspace(range[0], range[1], *points))
            }
            GridSpec::Step { range, step } => Ok(sweep::stepped(range[0], range[1], *step)?),
            GridSpec::Values { values } => {
                ensure!(!values.is_empty(), "grid has no values");
                Ok(values.clone())
            }
        }
    }
}

/// Layer structure from TOML.
#[derive(Debug, Deserialize)]
pub struct StructureConfig {
    pub substrate: String,
    pub metals: Vec<String>,
    pub adhesion: Option<AdhesionConfig>,
    /// Metal thickness sweep in nm.
    pub thickness_nm: GridSpec,
}

#[derive(Debug, Deserialize)]
pub struct AdhesionConfig {
    pub material: String,
    pub thickness_nm: f64,
}

/// Refractive index: a real number or `[n, k]`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum IndexSpec {
    Real(f64),
    Complex([f64; 2]),
}

impl IndexSpec {
    pub fn to_complex(self) -> Complex64 {
        match self {
            IndexSpec::Real(n) => Complex64::new(n, 0.0),
            IndexSpec::Complex([n, k]) => Complex64::new(n, k),
        }
    }
}

/// An analyte, given by index or by material name.
#[derive(Debug, Deserialize)]
pub struct AnalyteConfig {
    pub name: String,
    pub index: Option<IndexSpec>,
    pub material: Option<String>,
}

/// Analytes used for the sensitivity pair.
#[derive(Debug, Deserialize)]
pub struct SensingConfig {
    pub low: String,
    pub high: String,
    /// Analyte whose resonance and linewidth feed χ and Q (default: `high`).
    pub reference: Option<String>,
}

/// Reference-ladder settings.
#[derive(Debug, Deserialize)]
pub struct ReferenceConfig {
    pub thickness_nm: f64,
    #[serde(default = "default_offset")]
    pub offset: f64,
}

fn default_offset() -> f64 {
    0.001
}

/// Field profile at the resonance of each metal/analyte pair.
#[derive(Debug, Deserialize)]
pub struct FieldConfig {
    /// Metal thickness of the profiled structure.
    pub thickness_nm: f64,
    /// Depths below the first interface, in nm.
    pub depth_nm: GridSpec,
}

/// Wavelength-interrogation sweep with the indices held at the job wavelength.
#[derive(Debug, Deserialize)]
pub struct SpectralConfig {
    pub angle_deg: f64,
    pub thickness_nm: f64,
    pub wavelengths_nm: GridSpec,
}

/// A user-defined material: constant index or tabulated `[λ_nm, n, k]` rows.
#[derive(Debug, Deserialize)]
pub struct MaterialConfig {
    pub name: String,
    pub index: Option<IndexSpec>,
    pub data: Option<Vec<[f64; 3]>>,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save reflectance curves as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_curves: bool,
    /// Whether to also save the full results as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_curves: true,
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

impl JobConfig {
    pub fn wavelength_m(&self) -> f64 {
        self.simulation.wavelength_nm * 1e-9
    }

    /// Reference table plus the job's own materials.
    pub fn material_table(&self) -> Result<MaterialTable> {
        let mut table = MaterialTable::reference_850nm();
        for m in &self.materials {
            match (&m.index, &m.data) {
                (Some(index), None) => {
                    table.insert(ConstantMaterial::new(m.name.as_str(), index.to_complex()))
                }
                (None, Some(rows)) => {
                    let rows: Vec<(f64, f64, f64)> = rows.iter().map(|r| (r[0], r[1], r[2])).collect();
                    let material = TabulatedMaterial::from_rows(m.name.as_str(), &rows)
                        .with_context(|| format!("material '{}'", m.name))?;
                    table.insert(material);
                }
                _ => bail!("material '{}' needs exactly one of `index` or `data`", m.name),
            }
        }
        Ok(table)
    }

    /// Analytes with their indices resolved at the job wavelength.
    pub fn analytes(&self, table: &MaterialTable) -> Result<Vec<Analyte>> {
        self.analytes
            .iter()
            .map(|a| {
                let index = match (&a.index, &a.material) {
                    (Some(index), None) => index.to_complex(),
                    (None, Some(material)) => table
                        .index(material, self.simulation.wavelength_nm)
                        .with_context(|| format!("analyte '{}'", a.name))?,
                    _ => bail!("analyte '{}' needs exactly one of `index` or `material`", a.name),
                };
                Ok(Analyte::new(a.name.as_str(), index))
            })
            .collect()
    }

    pub fn sweep_plan(&self, table: &MaterialTable) -> Result<SweepPlan> {
        Ok(SweepPlan {
            substrate: self.structure.substrate.clone(),
            metals: self.structure.metals.clone(),
            analytes: self.analytes(table)?,
            thicknesses_nm: self.structure.thickness_nm.values()?,
            adhesion: self.structure.adhesion.as_ref().map(|a| AdhesionLayer {
                material: a.material.clone(),
                thickness_nm: a.thickness_nm,
            }),
        })
    }

    pub fn sweep_settings(&self) -> Result<SweepSettings> {
        let angles = AngleGrid::new(self.simulation.angles.values()?).context("angle grid")?;
        Ok(SweepSettings {
            wavelength_m: self.wavelength_m(),
            angles,
            resonance: self.simulation.resonance,
        })
    }

    /// Sensitivity pair: from `[sensing]`, or the lowest and highest real
    /// index among the analytes with the first analyte as reference.
    pub fn sensing_pair(&self, analytes: &[Analyte]) -> Result<SensingPair> {
        if let Some(s) = &self.sensing {
            let reference = s.reference.clone().unwrap_or_else(|| s.high.clone());
            return Ok(SensingPair::new(s.low.as_str(), s.high.as_str(), reference));
        }
        let by_index = |a: &&Analyte, b: &&Analyte| a.index.re.total_cmp(&b.index.re);
        let low = analytes.iter().min_by(by_index).context("no analytes")?;
        let high = analytes.iter().max_by(by_index).context("no analytes")?;
        ensure!(
            low.name != high.name,
            "figures of merit need two analytes with different indices, or a [sensing] section"
        );
        Ok(SensingPair::new(
            low.name.as_str(),
            high.name.as_str(),
            analytes[0].name.as_str(),
        ))
    }

    /// Fail fast on configuration errors before any computation.
    pub fn validate(&self) -> Result<()> {
        let wl = self.simulation.wavelength_nm;
        ensure!(wl.is_finite() && wl > 0.0, "wavelength_nm must be positive, got {wl}");
        self.sweep_settings()?;

        ensure!(!self.structure.metals.is_empty(), "structure.metals is empty");
        let thicknesses = self.structure.thickness_nm.values().context("thickness_nm")?;
        if let Some(d) = thicknesses.iter().find(|d| !(d.is_finite() && **d > 0.0)) {
            bail!("metal thickness must be positive, got {d}");
        }
        if let Some(a) = &self.structure.adhesion {
            ensure!(
                a.thickness_nm.is_finite() && a.thickness_nm >= 0.0,
                "adhesion thickness must be non-negative, got {}",
                a.thickness_nm
            );
        }

        let table = self.material_table()?;
        let mut names = vec![&self.structure.substrate];
        names.extend(&self.structure.metals);
        names.extend(self.structure.adhesion.as_ref().map(|a| &a.material));
        for name in names {
            table
                .index(name, wl)
                .with_context(|| format!("resolving '{name}' at {wl} nm"))?;
        }

        ensure!(!self.analytes.is_empty(), "no [[analyte]] entries");
        let analytes = self.analytes(&table)?;
        for (i, a) in analytes.iter().enumerate() {
            ensure!(
                !analytes[..i].iter().any(|b| b.name == a.name),
                "analyte '{}' defined twice",
                a.name
            );
        }

        match self.simulation.mode {
            Mode::Analysis | Mode::Comparison => {
                if self.simulation.mode == Mode::Analysis {
                    ensure!(
                        self.structure.metals.len() == 1,
                        "analysis mode takes exactly one metal, got {}",
                        self.structure.metals.len()
                    );
                }
                let pair = self.sensing_pair(&analytes)?;
                pair.validate(&analytes)?;
            }
            Mode::Reference => {
                let r = self
                    .reference
                    .as_ref()
                    .context("reference mode needs a [reference] section")?;
                ensure!(
                    r.thickness_nm.is_finite() && r.thickness_nm > 0.0,
                    "reference thickness must be positive"
                );
                ensure!(r.offset.is_finite() && r.offset > 0.0, "reference offset must be positive");
            }
        }

        if let Some(f) = &self.field {
            ensure!(f.thickness_nm.is_finite() && f.thickness_nm >= 0.0, "field thickness must be non-negative");
            f.depth_nm.values().context("field.depth_nm")?;
        }
        if let Some(s) = &self.spectral {
            ensure!(
                (0.0..90.0).contains(&s.angle_deg),
                "spectral angle must lie in [0°, 90°), got {}",
                s.angle_deg
            );
            let wls = s.wavelengths_nm.values().context("spectral.wavelengths_nm")?;
            if let Some(w) = wls.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
                bail!("spectral wavelength must be positive, got {w}");
            }
        }
        Ok(())
    }
}

/// Load, parse and validate a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = parse_config(&content).with_context(|| format!("in {}", path.display()))?;
    Ok(config)
}

/// Parse and validate a job from TOML text.
pub fn parse_config(content: &str) -> Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
