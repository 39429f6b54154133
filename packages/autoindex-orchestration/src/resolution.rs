//! Resolution of indexed spots on a flat detector
//!
//! The beam runs along +z and the detector is normal to it at `distance` mm.
//! A spot at detector position (x, y) scatters along (x - bx, y - by, D);
//! with s0 and s1 the incident and scattered wave vectors of length 1/λ the
//! interplanar spacing is d = 1 / |s1 - s0|. Rotating the crystal does not
//! change that norm, so spots are kept without their rotation angle.

use crate::engine::LowResolutionEstimator;
use crate::model::PayloadHandle;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorGeometry {
    /// Å
    pub wavelength: f64,
    /// Crystal to detector distance (mm)
    pub distance: f64,
    /// Direct beam position on the detector (mm)
    pub beam_centre: (f64, f64),
}

impl DetectorGeometry {
    /// Interplanar spacing (Å) of a reflection recorded at (x, y) mm.
    /// `None` for the direct beam position itself.
    pub fn d_spacing(&self, x_mm: f64, y_mm: f64) -> Option<f64> {
        let dx = x_mm - self.beam_centre.0;
        let dy = y_mm - self.beam_centre.1;
        let dz = self.distance;
        let norm = (dx * dx + dy * dy + dz * dz).sqrt();

        let k = 1.0 / self.wavelength;
        let s = [dx / norm * k, dy / norm * k, dz / norm * k - k];
        let length = (s[0] * s[0] + s[1] * s[1] + s[2] * s[2]).sqrt();

        if length > 0.0 {
            Some(1.0 / length)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexedSpot {
    pub x_mm: f64,
    pub y_mm: f64,
    pub miller: [i32; 3],
}

impl IndexedSpot {
    pub fn is_indexed(&self) -> bool {
        self.miller != [0, 0, 0]
    }
}

/// Largest d-spacing among spots with non-zero Miller indices
pub fn max_indexed_d_spacing(spots: &[IndexedSpot], geometry: &DetectorGeometry) -> Option<f64> {
    spots
        .iter()
        .filter(|spot| spot.is_indexed())
        .filter_map(|spot| geometry.d_spacing(spot.x_mm, spot.y_mm))
        .fold(None, |max, d| Some(max.map_or(d, |m: f64| m.max(d))))
}

/// Spot lists and geometries already parsed by the caller, keyed by handle
#[derive(Debug, Default)]
pub struct InMemorySpotStore {
    spot_lists: HashMap<PayloadHandle, Vec<IndexedSpot>>,
    geometries: HashMap<PayloadHandle, DetectorGeometry>,
}

impl InMemorySpotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spot_list(mut self, handle: PayloadHandle, spots: Vec<IndexedSpot>) -> Self {
        self.spot_lists.insert(handle, spots);
        self
    }

    pub fn with_geometry(mut self, handle: PayloadHandle, geometry: DetectorGeometry) -> Self {
        self.geometries.insert(handle, geometry);
        self
    }
}

#[async_trait]
impl LowResolutionEstimator for InMemorySpotStore {
    async fn max_d_spacing(
        &self,
        spot_list: &PayloadHandle,
        geometry: &PayloadHandle,
    ) -> anyhow::Result<f64> {
        let spots = self
            .spot_lists
            .get(spot_list)
            .ok_or_else(|| anyhow!("Unknown spot list: {}", spot_list))?;
        let geometry = self
            .geometries
            .get(geometry)
            .ok_or_else(|| anyhow!("Unknown geometry: {}", geometry))?;

        let Some(dmax) = max_indexed_d_spacing(spots, geometry) else {
            bail!("No indexed reflections in {}", spot_list);
        };

        debug!(
            "{} spots in {}, dmax {:.2}",
            spots.len(),
            spot_list,
            dmax
        );
        Ok(dmax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> DetectorGeometry {
        DetectorGeometry {
            wavelength: 1.0,
            distance: 100.0,
            beam_centre: (100.0, 100.0),
        }
    }

    fn spot(x_mm: f64, y_mm: f64, miller: [i32; 3]) -> IndexedSpot {
        IndexedSpot { x_mm, y_mm, miller }
    }

    #[test]
    fn test_d_spacing_matches_bragg() {
        // 2θ = 45°: d = λ / (2 sin 22.5°)
        let d = geometry().d_spacing(200.0, 100.0).unwrap();
        let expected = 1.0 / (2.0 * (22.5f64).to_radians().sin());

        assert!((d - expected).abs() < 1e-9);
    }

    #[test]
    fn test_direct_beam_has_no_spacing() {
        assert!(geometry().d_spacing(100.0, 100.0).is_none());
    }

    #[test]
    fn test_closer_to_beam_is_lower_resolution() {
        let g = geometry();
        assert!(g.d_spacing(110.0, 100.0).unwrap() > g.d_spacing(150.0, 100.0).unwrap());
    }

    #[test]
    fn test_unindexed_spots_ignored() {
        let spots = vec![
            spot(101.0, 100.0, [0, 0, 0]),
            spot(120.0, 100.0, [1, 0, 0]),
            spot(150.0, 100.0, [2, 1, 0]),
        ];
        let g = geometry();

        assert_eq!(
            max_indexed_d_spacing(&spots, &g),
            g.d_spacing(120.0, 100.0)
        );
        assert_eq!(max_indexed_d_spacing(&spots[..1], &g), None);
    }

    #[tokio::test]
    async fn test_store_estimates_from_handles() {
        let store = InMemorySpotStore::new()
            .with_spot_list(
                PayloadHandle::new("SPOT.XDS"),
                vec![spot(120.0, 100.0, [1, 0, 0])],
            )
            .with_geometry(PayloadHandle::new("GXPARM.XDS"), geometry());

        let dmax = store
            .max_d_spacing(&PayloadHandle::new("SPOT.XDS"), &PayloadHandle::new("GXPARM.XDS"))
            .await
            .unwrap();
        assert_eq!(Some(dmax), geometry().d_spacing(120.0, 100.0));

        assert!(store
            .max_d_spacing(&PayloadHandle::new("missing"), &PayloadHandle::new("GXPARM.XDS"))
            .await
            .is_err());
    }
}
