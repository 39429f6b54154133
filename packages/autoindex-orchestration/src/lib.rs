/*
 * Autoindex Orchestration - lazy, self-correcting crystal indexing
 *
 * Control layer around an external autoindexing program.
 *
 * Architecture:
 * - Result cache with dirty-flag invalidation
 * - Wedge selection (pluggable policy)
 * - Failure classification from structured engine reports
 * - Retry state machine (continue-from-error, bounded)
 * - Solution validation (centring analysis, replace-and-rerun)
 * - Versioned YAML configuration
 */

// Public modules
pub mod cache;
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod resolution;
pub mod retry;
pub mod validator;
pub mod wedge;

// Re-exports
pub use cache::ResultCache;
pub use classifier::ErrorClassifier;
pub use config::{
    ConfigError, OrchestratorConfig, RetryPolicy, SelectionPolicy, TolerancePolicy,
    ValidationPolicy,
};
pub use diagnostics::{FailureKind, FailureReport};
pub use engine::{CentringAnalysis, ImageSelectionPolicy, IndexingEngine, LowResolutionEstimator};
pub use error::{FailureCategory, OrchestratorError, Result};
pub use model::{
    roles, ImageSet, IndexingRequest, IndexingResult, IndexingSolution, Lattice,
    LatticeCandidate, Payload, PayloadHandle, StartingReference, UnitCell, Wedge,
};
pub use orchestrator::IndexingOrchestrator;
pub use resolution::{DetectorGeometry, InMemorySpotStore, IndexedSpot};
pub use retry::{RetryController, RetryOutcome, RetryState};
pub use validator::{SolutionValidator, Validation, ValidationContext};
pub use wedge::{select_wedges, DefaultWedgeSelector};
