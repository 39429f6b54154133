//! Image wedge selection
//!
//! Indexing works best from a few small blocks of images spread widely in
//! rotation. Given the images of a sweep this picks:
//! - one or two single images when only a reference pair is available
//! - otherwise a first block, plus blocks near 45° and 90° when the sweep is
//!   long enough, or else a mid-sweep block and a tail block

use crate::config::SelectionPolicy;
use crate::engine::ImageSelectionPolicy;
use crate::error::{OrchestratorError, Result};
use crate::model::{ImageSet, Wedge};
use tracing::debug;

/// Fewer images than this are treated as a reference pair
const REFERENCE_PAIR_LIMIT: usize = 3;

#[derive(Debug, Clone)]
pub struct DefaultWedgeSelector {
    max_block_size: usize,
}

impl DefaultWedgeSelector {
    pub fn new(policy: &SelectionPolicy) -> Self {
        Self {
            max_block_size: policy.max_block_size.max(1),
        }
    }
}

impl Default for DefaultWedgeSelector {
    fn default() -> Self {
        Self::new(&SelectionPolicy::default())
    }
}

impl ImageSelectionPolicy for DefaultWedgeSelector {
    fn select_wedges(&self, images: &ImageSet) -> Result<Vec<Wedge>> {
        select_wedges(images.images(), images.phi_width(), self.max_block_size)
    }
}

/// Pick wedges from ascending `images` with oscillation `phi_width` degrees.
pub fn select_wedges(images: &[u32], phi_width: f64, max_block_size: usize) -> Result<Vec<Wedge>> {
    if images.is_empty() {
        return Err(OrchestratorError::NoImages);
    }
    if !(phi_width.is_finite() && phi_width > 0.0) {
        return Err(OrchestratorError::invalid_input(format!(
            "phi width must be positive, got {}",
            phi_width
        )));
    }

    let count = images.len();
    let first = images[0];

    if count < REFERENCE_PAIR_LIMIT {
        let mut wedges = vec![Wedge::single(first)];
        if let Some(&second) = images.get(1) {
            wedges.push(Wedge::single(second));
        }
        debug!("Reference images for indexer: {:?}", images);
        return Ok(wedges);
    }

    let block_size = count.min(max_block_size.max(1));
    let block = block_size as u32;

    let head = Wedge {
        start: first,
        end: images[block_size - 1],
    };
    debug!("Adding images for indexer: {}", head);
    let mut wedges = vec![head];

    let quarter = (45.0 / phi_width).floor() as u32;
    let right_angle = (90.0 / phi_width).floor() as u32;

    let far_block_end = first
        .checked_add(right_angle)
        .and_then(|v| v.checked_add(block - 1));
    let far_block_present = far_block_end.is_some_and(|end| images.binary_search(&end).is_ok());

    if far_block_present {
        for offset in [quarter, right_angle] {
            let wedge = Wedge {
                start: first + offset,
                end: first + offset + block - 1,
            };
            debug!("Adding images for indexer: {}", wedge);
            wedges.push(wedge);
        }
        return Ok(wedges);
    }

    // count/2 - block/2 + first - 1, which may be below `first` for short sweeps
    let mid_start = (count / 2) as i64 - (block_size / 2) as i64 + first as i64 - 1;
    if mid_start > head.end as i64 {
        let start = mid_start as u32;
        let wedge = Wedge {
            start,
            end: start + block - 1,
        };
        debug!("Adding images for indexer: {}", wedge);
        wedges.push(wedge);
    }

    if count > block_size {
        let wedge = Wedge {
            start: images[count - block_size],
            end: images[count - 1],
        };
        debug!("Adding images for indexer: {}", wedge);
        wedges.push(wedge);
    }

    Ok(wedges)
}
