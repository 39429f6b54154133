//! Orchestrator configuration
//!
//! Everything the indexing loop would otherwise read from process-wide flags
//! (relaxed cell tolerance, retry bounds, validation policy) lives here and is
//! handed to the orchestrator at construction.
//!
//! ```rust,ignore
//! let config = OrchestratorConfig::from_yaml("autoindex.yaml")?;
//! let orchestrator = IndexingOrchestrator::new(images, engine, centring, estimator, config)?;
//! ```

pub mod error;
pub mod io;

pub use error::{ConfigError, ConfigResult};
pub use io::ConfigExportV1;

use serde::{Deserialize, Serialize};

/// Wedge selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionPolicy {
    /// Upper bound on images per wedge
    pub max_block_size: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self { max_block_size: 5 }
    }
}

/// Retry loop bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Continue-from-error invocations allowed per run
    pub max_continuations: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_continuations: 5,
        }
    }
}

/// Agreement required between a proposed and a target cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TolerancePolicy {
    /// Relative deviation allowed on a, b, c
    pub length_fraction: f64,
    /// Absolute deviation allowed on alpha, beta, gamma
    pub angle_degrees: f64,
    /// Accept any cell when the engine complains about indexed percentage
    pub relax: bool,
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self {
            length_fraction: 0.02,
            angle_degrees: 2.0,
            relax: false,
        }
    }
}

/// Post-indexing validation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationPolicy {
    /// Lattice replacements allowed per `get()`
    pub max_replacements: u32,
    /// Multiplier applied to the largest indexed d-spacing
    pub low_resolution_margin: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_replacements: 1,
            low_resolution_margin: 1.05,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    pub selection: SelectionPolicy,
    pub retry: RetryPolicy,
    pub tolerance: TolerancePolicy,
    pub validation: ValidationPolicy,
}

impl OrchestratorConfig {
    /// Relaxed cell checking, as used for difficult or small-molecule data
    pub fn relaxed() -> Self {
        let mut config = Self::default();
        config.tolerance.relax = true;
        config
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=100).contains(&self.selection.max_block_size) {
            return Err(ConfigError::range_with_hint(
                "selection.max_block_size",
                self.selection.max_block_size,
                1,
                100,
                "A wedge needs at least one image",
            ));
        }

        if self.retry.max_continuations > 100 {
            return Err(ConfigError::range_with_hint(
                "retry.max_continuations",
                self.retry.max_continuations,
                0,
                100,
                "Repeated continuations rarely converge; abort instead",
            ));
        }

        let t = &self.tolerance;
        if !(t.length_fraction > 0.0 && t.length_fraction < 1.0) {
            return Err(ConfigError::range_with_hint(
                "tolerance.length_fraction",
                t.length_fraction,
                0.0,
                1.0,
                "Use e.g. 0.02 for a two percent tolerance",
            ));
        }
        if !(t.angle_degrees > 0.0 && t.angle_degrees < 90.0) {
            return Err(ConfigError::range_with_hint(
                "tolerance.angle_degrees",
                t.angle_degrees,
                0.0,
                90.0,
                "Angle tolerance is in degrees",
            ));
        }

        let v = &self.validation;
        if v.max_replacements > 10 {
            return Err(ConfigError::range_with_hint(
                "validation.max_replacements",
                v.max_replacements,
                0,
                10,
                "Each replacement reruns the full indexing cycle",
            ));
        }
        if !(1.0..=2.0).contains(&v.low_resolution_margin) {
            return Err(ConfigError::range_with_hint(
                "validation.low_resolution_margin",
                v.low_resolution_margin,
                1.0,
                2.0,
                "The margin widens the limit; 1.05 adds five percent",
            ));
        }

        Ok(())
    }
}
