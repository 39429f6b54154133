use crate::model::IndexingResult;
use std::sync::Arc;
use tracing::debug;

/// Last accepted result plus the dirty flag guarding it
///
/// The result is only handed out while the entry is clean. Storing a result
/// replaces the previous one wholesale.
#[derive(Debug)]
pub struct ResultCache {
    dirty: bool,
    result: Option<Arc<IndexingResult>>,
    runs: u64,
    invalidations: u64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            dirty: true,
            result: None,
            runs: 0,
            invalidations: 0,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The cached result, if it is still valid
    pub fn fresh(&self) -> Option<Arc<IndexingResult>> {
        if self.dirty {
            None
        } else {
            self.result.clone()
        }
    }

    /// Most recent result regardless of validity
    pub fn last(&self) -> Option<Arc<IndexingResult>> {
        self.result.clone()
    }

    /// Mark the entry dirty (an input changed)
    pub fn invalidate(&mut self) {
        if !self.dirty {
            debug!("Indexing result invalidated");
        }
        self.dirty = true;
        self.invalidations += 1;
    }

    /// Store a fresh result and clear the dirty flag
    pub fn store(&mut self, result: IndexingResult) -> Arc<IndexingResult> {
        let result = Arc::new(result);
        self.result = Some(result.clone());
        self.dirty = false;
        self.runs += 1;
        result
    }

    /// Number of results stored
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lattice, Payload, UnitCell};
    use chrono::Utc;
    use uuid::Uuid;

    fn result(mosaic: f64) -> IndexingResult {
        IndexingResult {
            run_id: Uuid::new_v4(),
            lattice: Lattice::TetragonalP,
            cell: UnitCell::new([78.0, 78.0, 37.0, 90.0, 90.0, 90.0]).unwrap(),
            mosaic,
            payload: Payload::new(),
            low_resolution_limit: Some(40.0),
            refined_beam: None,
            refined_distance: None,
            alternatives: vec![],
            attempts: 1,
            continued: false,
            replacements: 0,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_cache_is_dirty() {
        let cache = ResultCache::new();
        assert!(cache.is_dirty());
        assert!(cache.fresh().is_none());
    }

    #[test]
    fn test_store_clears_dirty() {
        let mut cache = ResultCache::new();
        cache.store(result(0.2));

        assert!(!cache.is_dirty());
        assert_eq!(cache.fresh().unwrap().mosaic, 0.2);
        assert_eq!(cache.runs(), 1);
    }

    #[test]
    fn test_invalidate_hides_result() {
        let mut cache = ResultCache::new();
        cache.store(result(0.2));
        cache.invalidate();

        assert!(cache.fresh().is_none());
        assert_eq!(cache.last().unwrap().mosaic, 0.2);
    }

    #[test]
    fn test_store_replaces_existing() {
        let mut cache = ResultCache::new();
        let first = cache.store(result(0.2));
        cache.invalidate();
        cache.store(result(0.4));

        // earlier snapshots stay intact
        assert_eq!(first.mosaic, 0.2);
        assert_eq!(cache.fresh().unwrap().mosaic, 0.4);
        assert_eq!(cache.runs(), 2);
    }
}
