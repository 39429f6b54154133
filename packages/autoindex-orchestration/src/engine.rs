use crate::diagnostics::FailureReport;
use crate::error::Result;
use crate::model::{ImageSet, IndexingRequest, IndexingSolution, Lattice, PayloadHandle, UnitCell, Wedge};
use async_trait::async_trait;

/// External indexing program (pluggable)
#[async_trait]
pub trait IndexingEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Run indexing. With `resume_from_partial` the engine carries on from the
    /// partial result of its previous failed attempt instead of starting over.
    async fn run_indexing(
        &self,
        request: &IndexingRequest,
        resume_from_partial: bool,
    ) -> std::result::Result<IndexingSolution, FailureReport>;
}

/// Independent lattice/centring check from indexed spots
#[async_trait]
pub trait CentringAnalysis: Send + Sync {
    async fn analyse(
        &self,
        orientation: &PayloadHandle,
        spot_list: &PayloadHandle,
    ) -> anyhow::Result<(Lattice, UnitCell)>;
}

/// Low-resolution estimate from the indexed spot list
#[async_trait]
pub trait LowResolutionEstimator: Send + Sync {
    /// Largest interplanar spacing (Å) among reflections with non-zero
    /// Miller indices. The caller applies its own safety margin.
    async fn max_d_spacing(
        &self,
        spot_list: &PayloadHandle,
        geometry: &PayloadHandle,
    ) -> anyhow::Result<f64>;
}

/// Chooses which images to index from
pub trait ImageSelectionPolicy: Send + Sync {
    fn select_wedges(&self, images: &ImageSet) -> Result<Vec<Wedge>>;
}
