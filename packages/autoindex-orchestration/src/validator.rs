//! Post-indexing checks
//!
//! A successful engine run is not trusted blindly. An independent centring
//! analysis of the indexed spots is compared with the engine's answer: if the
//! engine had to continue past an error and the analysis prefers another
//! lattice, or if the analysis finds an axis twice as long, the orchestrator
//! reseeds the request with the analysis result and runs again.

use crate::config::ValidationPolicy;
use crate::engine::{CentringAnalysis, LowResolutionEstimator};
use crate::error::Result;
use crate::model::{roles, IndexingSolution, LatticeCandidate, UnitCell};
use tracing::{debug, info, warn};

/// Outcome of validating a solution
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Accepted,
    /// Rerun with `candidate` as the target lattice and cell
    Replace {
        candidate: LatticeCandidate,
        /// Axes (0 = a, 1 = b, 2 = c) found doubled by the analysis
        doubled_axes: Vec<usize>,
    },
}

impl Validation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Validation::Accepted)
    }
}

/// Per-run facts the validator needs besides the solution itself
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationContext {
    /// Lattice was forced by the caller; skip the analysis entirely
    pub user_forced: bool,
    /// The retry loop had to continue from an error
    pub continued: bool,
    /// Replacements already made during this `get()`
    pub replacements: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SolutionValidator {
    policy: ValidationPolicy,
}

impl SolutionValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub async fn validate(
        &self,
        centring: &dyn CentringAnalysis,
        solution: &IndexingSolution,
        context: ValidationContext,
    ) -> Result<Validation> {
        if context.user_forced {
            debug!("Lattice forced by user, skipping centring analysis");
            return Ok(Validation::Accepted);
        }

        let orientation = solution.payload_entry(roles::ORIENTATION)?;
        let spot_list = solution.payload_entry(roles::SPOT_LIST)?;

        let (lattice, cell) = centring.analyse(orientation, spot_list).await?;
        debug!(
            "Centring analysis: {} {} (engine: {} {})",
            lattice, cell, solution.lattice, solution.cell
        );

        let doubled = doubled_axes(&solution.cell, &cell);
        let lattice_changed = context.continued && lattice != solution.lattice;

        if !lattice_changed && doubled.is_empty() {
            return Ok(Validation::Accepted);
        }

        if context.replacements >= self.policy.max_replacements {
            warn!(
                "Centring analysis suggests {} {} but {} replacement(s) already made; accepting {}",
                lattice, cell, context.replacements, solution.lattice
            );
            return Ok(Validation::Accepted);
        }

        if !doubled.is_empty() {
            info!("Doubled cell axes {:?}, reindexing as {} {}", doubled, lattice, cell);
        } else {
            info!(
                "Subtree problem with {}, reindexing as {}",
                solution.lattice, lattice
            );
        }

        Ok(Validation::Replace {
            candidate: LatticeCandidate { lattice, cell },
            doubled_axes: doubled,
        })
    }

    /// Low-resolution limit for an accepted solution
    pub async fn low_resolution_limit(
        &self,
        estimator: &dyn LowResolutionEstimator,
        solution: &IndexingSolution,
    ) -> Result<f64> {
        let spot_list = solution.payload_entry(roles::SPOT_LIST)?;
        let geometry = solution.payload_entry(roles::ORIENTATION)?;

        let dmax = estimator.max_d_spacing(spot_list, geometry).await?;
        let limit = dmax * self.policy.low_resolution_margin;
        debug!("Low resolution limit: {:.2} (dmax {:.2})", limit, dmax);
        Ok(limit)
    }
}

/// Axes where `candidate` is twice as long as `accepted`, after rounding.
pub fn doubled_axes(accepted: &UnitCell, candidate: &UnitCell) -> Vec<usize> {
    accepted
        .lengths()
        .into_iter()
        .zip(candidate.lengths())
        .enumerate()
        .filter(|(_, (a, c))| (c / a).round() == 2.0)
        .map(|(axis, _)| axis)
        .collect()
}
