use crate::cache::ResultCache;
use crate::classifier::ErrorClassifier;
use crate::config::OrchestratorConfig;
use crate::engine::{CentringAnalysis, ImageSelectionPolicy, IndexingEngine, LowResolutionEstimator};
use crate::error::{OrchestratorError, Result};
use crate::model::{
    ImageSet, IndexingRequest, IndexingResult, IndexingSolution, Lattice, PayloadHandle, UnitCell,
    Wedge,
};
use crate::retry::{RetryController, RetryOutcome, RetryState};
use crate::validator::{SolutionValidator, Validation, ValidationContext};
use crate::wedge::DefaultWedgeSelector;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lazily computed indexing for one sweep
///
/// Setters only record the new input and mark the cached result dirty;
/// [`get`](Self::get) does the work on demand.
pub struct IndexingOrchestrator {
    id: Uuid,
    request: IndexingRequest,
    cache: ResultCache,
    engine: Arc<dyn IndexingEngine>,
    selection: Arc<dyn ImageSelectionPolicy>,
    centring: Arc<dyn CentringAnalysis>,
    estimator: Arc<dyn LowResolutionEstimator>,
    retry: RetryController,
    validator: SolutionValidator,
    config: OrchestratorConfig,
}

impl IndexingOrchestrator {
    pub fn new(
        images: Arc<ImageSet>,
        engine: Arc<dyn IndexingEngine>,
        centring: Arc<dyn CentringAnalysis>,
        estimator: Arc<dyn LowResolutionEstimator>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            request: IndexingRequest::new(images),
            cache: ResultCache::new(),
            engine,
            selection: Arc::new(DefaultWedgeSelector::new(&config.selection)),
            centring,
            estimator,
            retry: RetryController::new(
                ErrorClassifier::new(config.tolerance.clone()),
                config.retry.clone(),
            ),
            validator: SolutionValidator::new(config.validation.clone()),
            config,
        })
    }

    /// Replace the wedge selection heuristic
    pub fn with_selection_policy(mut self, selection: Arc<dyn ImageSelectionPolicy>) -> Self {
        self.selection = selection;
        self.cache.invalidate();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // Inputs (each one invalidates the cached result)

    /// Replace the wedges to index from
    pub fn set_images<I, W>(&mut self, wedges: I) -> Result<()>
    where
        I: IntoIterator<Item = W>,
        W: Into<Wedge>,
    {
        let wedges: Vec<Wedge> = wedges.into_iter().map(Into::into).collect();
        self.request.replace_wedges(wedges)?;
        self.cache.invalidate();
        Ok(())
    }

    /// Add one wedge; a bare image number is a one-image wedge
    pub fn add_wedge(&mut self, wedge: impl Into<Wedge>) -> Result<()> {
        let wedge = wedge.into();
        self.request.push_wedge(wedge)?;
        debug!("Added wedge {} to {}", wedge, self.id);
        self.cache.invalidate();
        Ok(())
    }

    pub fn set_target_lattice(&mut self, lattice: Lattice) {
        self.request.set_target_lattice(Some(lattice));
        self.cache.invalidate();
    }

    pub fn set_target_cell(&mut self, cell: UnitCell) {
        self.request.set_target_cell(Some(cell));
        self.cache.invalidate();
    }

    /// With `forced` the caller's lattice is final and validation is skipped
    pub fn set_user_forced(&mut self, forced: bool) {
        self.request.set_user_forced(forced);
        self.cache.invalidate();
    }

    pub fn set_background_range(&mut self, wedge: impl Into<Wedge>) -> Result<()> {
        self.request.set_background_range(Some(wedge.into()))?;
        self.cache.invalidate();
        Ok(())
    }

    /// The sweep grew: later wedges may now refer to `images`
    pub fn append_images(&mut self, images: &[u32]) {
        let grown = self.request.images().appended(images);
        debug!(
            "Sweep {} now has {} images",
            self.id,
            grown.len()
        );
        self.request.set_images(Arc::new(grown));
        self.cache.invalidate();
    }

    // Outputs

    /// Current result, running the indexing first if any input changed
    pub async fn get(&mut self) -> Result<Arc<IndexingResult>> {
        if let Some(result) = self.cache.fresh() {
            debug!("Returning cached result {} for {}", result.run_id, self.id);
            return Ok(result);
        }

        let run_id = Uuid::new_v4();
        let start_time = Instant::now();
        info!(
            "Starting indexing run {} for {} with engine {}",
            run_id,
            self.id,
            self.engine.name()
        );

        match self.run(run_id).await {
            Ok(result) => {
                info!(
                    "Indexing run {} completed in {}ms: {} {} (mosaic {:.3})",
                    run_id,
                    start_time.elapsed().as_millis(),
                    result.lattice,
                    result.cell,
                    result.mosaic
                );
                Ok(self.cache.store(result))
            }
            Err(e) => {
                error!("Indexing run {} failed: {}", run_id, e);
                Err(e)
            }
        }
    }

    /// Payload entry `role` of the current result
    pub async fn payload(&mut self, role: &str) -> Result<Option<PayloadHandle>> {
        let result = self.get().await?;
        Ok(result.payload(role).cloned())
    }

    async fn run(&mut self, run_id: Uuid) -> Result<IndexingResult> {
        if self.request.wedges().is_empty() {
            let wedges = self.selection.select_wedges(self.request.images())?;
            info!("Selected {} wedge(s) for run {}", wedges.len(), run_id);
            self.request.replace_wedges(wedges)?;
        }

        let mut replacements = 0;

        loop {
            let outcome = self.retry.run(self.engine.as_ref(), &self.request).await?;

            let context = ValidationContext {
                user_forced: self.request.user_forced(),
                continued: outcome.continued,
                replacements,
            };

            match self
                .validator
                .validate(self.centring.as_ref(), &outcome.solution, context)
                .await?
            {
                Validation::Accepted => return self.accept(run_id, outcome, replacements).await,
                Validation::Replace { candidate, .. } => {
                    self.request.set_target_lattice(Some(candidate.lattice));
                    self.request.set_target_cell(Some(candidate.cell));
                    self.cache.invalidate();
                    replacements += 1;
                    info!(
                        "Rerunning {} with target {} {}",
                        run_id, candidate.lattice, candidate.cell
                    );
                }
            }
        }
    }

    async fn accept(
        &self,
        run_id: Uuid,
        outcome: RetryOutcome,
        replacements: u32,
    ) -> Result<IndexingResult> {
        let RetryOutcome {
            solution,
            attempts,
            continued,
        } = outcome;

        let low_resolution_limit = self.low_resolution_limit(&solution).await?;

        let IndexingSolution {
            lattice,
            cell,
            mosaic,
            payload,
            refined_beam,
            refined_distance,
            alternatives,
        } = solution;

        Ok(IndexingResult {
            run_id,
            lattice,
            cell,
            mosaic,
            payload,
            low_resolution_limit,
            refined_beam,
            refined_distance,
            alternatives,
            attempts,
            continued,
            replacements,
            completed_at: Utc::now(),
        })
    }

    /// A missing payload role is an error; a failing estimator only loses the estimate.
    async fn low_resolution_limit(&self, solution: &IndexingSolution) -> Result<Option<f64>> {
        match self
            .validator
            .low_resolution_limit(self.estimator.as_ref(), solution)
            .await
        {
            Ok(limit) => Ok(Some(limit)),
            Err(OrchestratorError::Collaborator(e)) => {
                warn!("Low resolution estimate unavailable: {:#}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // Accessors

    pub fn request(&self) -> &IndexingRequest {
        &self.request
    }

    pub fn target_lattice(&self) -> Option<Lattice> {
        self.request.target_lattice()
    }

    pub fn target_cell(&self) -> Option<UnitCell> {
        self.request.target_cell()
    }

    pub fn is_dirty(&self) -> bool {
        self.cache.is_dirty()
    }

    /// Number of completed (stored) runs
    pub fn run_count(&self) -> u64 {
        self.cache.runs()
    }

    /// Last accepted result even if inputs changed since
    pub fn last_result(&self) -> Option<Arc<IndexingResult>> {
        self.cache.last()
    }

    pub fn retry_state(&self) -> &RetryState {
        self.retry.state()
    }
}
