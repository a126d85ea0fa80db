//! Named material table.
//!
//! [`MaterialTable`] maps material identifiers to providers. Lookups are
//! case-insensitive ("au", "Au" and "AU" resolve to the same entry) and an
//! unknown name is a [`MaterialError::NotFound`], which callers treat as a
//! configuration error.
//!
//! ## Reference constants (λ = 850 nm)
//!
//! | Identifier | Medium | $\tilde{n}$ |
//! |-----------|--------|-------------|
//! | `PMMA` | Poly(methyl methacrylate) substrate | 1.4835 |
//! | `PC` | Polycarbonate substrate | 1.5688 |
//! | `TOPAS` | Cyclic olefin copolymer substrate | 1.5548 |
//! | `Cr` | Chromium adhesion layer | 3.2408 + 3.4963i |
//! | `Ag` | Silver | 0.040 + 5.3194i |
//! | `Au` | Gold | 0.16408 + 5.3194i |
//! | `Cu` | Copper | 0.27630 + 5.4197i |
//! | `H2O_central` | Water | 1.3290 + 2.93e-7i |
//! | `H2O_low` | Water, lower analyte index | 1.3481 + 2.93e-7i |
//! | `H2O_high` | Water, higher analyte index | 1.3492 + 2.93e-7i |

use std::collections::BTreeMap;

use num_complex::Complex64;

use crate::constant::ConstantMaterial;
use crate::provider::{MaterialError, MaterialProvider};

/// Wavelength (nm) at which the reference constants are quoted.
pub const REFERENCE_WAVELENGTH_NM: f64 = 850.0;

/// Case-insensitive registry of material providers.
#[derive(Default)]
pub struct MaterialTable {
    entries: BTreeMap<String, Box<dyn MaterialProvider>>,
}

impl MaterialTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference constants at 850 nm for polymer-prism SPR sensors.
    pub fn reference_850nm() -> Self {
        let mut table = Self::new();
        let entries: &[(&str, f64, f64)] = &[
            ("PMMA", 1.4835, 0.0),
            ("PC", 1.5688, 0.0),
            ("TOPAS", 1.5548, 0.0),
            ("Cr", 3.2408, 3.4963),
            ("Ag", 0.040, 5.3194),
            ("Au", 0.16408, 5.3194),
            ("Cu", 0.27630, 5.4197),
            ("H2O_central", 1.3290, 2.93e-7),
            ("H2O_low", 1.3481, 2.93e-7),
            ("H2O_high", 1.3492, 2.93e-7),
        ];
        for &(name, n, k) in entries {
            table.insert(ConstantMaterial::new(name, Complex64::new(n, k)));
        }
        table
    }

    /// Register a provider under its own name, replacing any entry with the same key.
    pub fn insert<P: MaterialProvider + 'static>(&mut self, provider: P) {
        let key = provider.name().to_lowercase();
        if self.entries.contains_key(&key) {
            log::debug!("Material '{}' overrides an existing entry", provider.name());
        }
        self.entries.insert(key, Box::new(provider));
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Result<&dyn MaterialProvider, MaterialError> {
        self.entries
            .get(&name.to_lowercase())
            .map(|p| p.as_ref())
            .ok_or_else(|| MaterialError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Complex refractive index of `name` at `wavelength_nm`.
    pub fn index(&self, name: &str, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        self.get(name)?.refractive_index(wavelength_nm)
    }

    /// Providers in key order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn MaterialProvider> {
        self.entries.values().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for MaterialTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.values().map(|p| p.name())).finish()
    }
}
