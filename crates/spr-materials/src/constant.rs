//! Non-dispersive materials with a single complex refractive index.
//!
//! SPR sensor studies are usually run at one laser line, so the whole stack
//! is described by one index per medium quoted at that reference wavelength.

use num_complex::Complex64;

use crate::provider::{MaterialError, MaterialProvider};

/// A material whose refractive index does not vary with wavelength.
#[derive(Debug, Clone)]
pub struct ConstantMaterial {
    name: String,
    index: Complex64,
}

impl ConstantMaterial {
    /// # Arguments
    /// * `name` - Material identifier (e.g. "Au", "TOPAS").
    /// * `index` - Complex refractive index $n + ik$.
    pub fn new(name: impl Into<String>, index: Complex64) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Lossless dielectric with a real refractive index.
    pub fn dielectric(name: impl Into<String>, n: f64) -> Self {
        Self::new(name, Complex64::new(n, 0.0))
    }

    pub fn index(&self) -> Complex64 {
        self.index
    }
}

impl MaterialProvider for ConstantMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> Option<(f64, f64)> {
        None
    }

    fn refractive_index(&self, _wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        Ok(self.index)
    }
}
