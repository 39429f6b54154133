//! Data model shared by the selection, retry and validation layers.

use crate::error::{OrchestratorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Well-known payload roles looked up by the core.
pub mod roles {
    /// Refined orientation matrix and experimental geometry
    pub const ORIENTATION: &str = "orientation";
    /// Spot list with assigned Miller indices
    pub const SPOT_LIST: &str = "spot_list";
}

/// Bravais lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Lattice {
    TriclinicP,
    MonoclinicP,
    MonoclinicC,
    OrthorhombicP,
    OrthorhombicC,
    OrthorhombicI,
    OrthorhombicF,
    TetragonalP,
    TetragonalI,
    HexagonalP,
    RhombohedralR,
    CubicP,
    CubicI,
    CubicF,
}

impl Lattice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lattice::TriclinicP => "aP",
            Lattice::MonoclinicP => "mP",
            Lattice::MonoclinicC => "mC",
            Lattice::OrthorhombicP => "oP",
            Lattice::OrthorhombicC => "oC",
            Lattice::OrthorhombicI => "oI",
            Lattice::OrthorhombicF => "oF",
            Lattice::TetragonalP => "tP",
            Lattice::TetragonalI => "tI",
            Lattice::HexagonalP => "hP",
            Lattice::RhombohedralR => "hR",
            Lattice::CubicP => "cP",
            Lattice::CubicI => "cI",
            Lattice::CubicF => "cF",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "aP" => Ok(Lattice::TriclinicP),
            "mP" => Ok(Lattice::MonoclinicP),
            "mC" => Ok(Lattice::MonoclinicC),
            "oP" => Ok(Lattice::OrthorhombicP),
            "oC" => Ok(Lattice::OrthorhombicC),
            "oI" => Ok(Lattice::OrthorhombicI),
            "oF" => Ok(Lattice::OrthorhombicF),
            "tP" => Ok(Lattice::TetragonalP),
            "tI" => Ok(Lattice::TetragonalI),
            "hP" => Ok(Lattice::HexagonalP),
            "hR" => Ok(Lattice::RhombohedralR),
            "cP" => Ok(Lattice::CubicP),
            "cI" => Ok(Lattice::CubicI),
            "cF" => Ok(Lattice::CubicF),
            _ => Err(OrchestratorError::invalid_input(format!(
                "Invalid lattice symbol: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Lattice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for Lattice {
    type Error = OrchestratorError;

    fn try_from(s: String) -> Result<Self> {
        Lattice::from_str(&s)
    }
}

impl From<Lattice> for String {
    fn from(lattice: Lattice) -> Self {
        lattice.as_str().to_string()
    }
}

/// Unit cell: three lengths (Å) and three angles (degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl UnitCell {
    pub fn new(params: [f64; 6]) -> Result<Self> {
        let [a, b, c, alpha, beta, gamma] = params;

        for (name, length) in [("a", a), ("b", b), ("c", c)] {
            if !(length.is_finite() && length > 0.0) {
                return Err(OrchestratorError::invalid_input(format!(
                    "cell length {} must be positive, got {}",
                    name, length
                )));
            }
        }
        for (name, angle) in [("alpha", alpha), ("beta", beta), ("gamma", gamma)] {
            if !(angle.is_finite() && angle > 0.0 && angle < 180.0) {
                return Err(OrchestratorError::invalid_input(format!(
                    "cell angle {} must lie in (0, 180), got {}",
                    name, angle
                )));
            }
        }

        Ok(Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        })
    }

    pub fn lengths(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    pub fn angles(&self) -> [f64; 3] {
        [self.alpha, self.beta, self.gamma]
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    /// True when every length agrees with `target` to within `length_fraction`
    /// (relative) and every angle to within `angle_degrees` (absolute).
    pub fn agrees_with(&self, target: &UnitCell, length_fraction: f64, angle_degrees: f64) -> bool {
        let lengths_ok = self
            .lengths()
            .iter()
            .zip(target.lengths())
            .all(|(l, t)| ((l - t) / t).abs() <= length_fraction);

        let angles_ok = self
            .angles()
            .iter()
            .zip(target.angles())
            .all(|(a, t)| (a - t).abs() <= angle_degrees);

        lengths_ok && angles_ok
    }
}

impl TryFrom<[f64; 6]> for UnitCell {
    type Error = OrchestratorError;

    fn try_from(params: [f64; 6]) -> Result<Self> {
        UnitCell::new(params)
    }
}

impl std::fmt::Display for UnitCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:6.2} {:6.2} {:6.2} {:6.2} {:6.2} {:6.2}",
            self.a, self.b, self.c, self.alpha, self.beta, self.gamma
        )
    }
}

/// Closed range of image numbers submitted together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wedge {
    pub start: u32,
    pub end: u32,
}

impl Wedge {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(OrchestratorError::invalid_input(format!(
                "wedge start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(image: u32) -> Self {
        Self {
            start: image,
            end: image,
        }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn overlaps(&self, other: &Wedge) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl From<u32> for Wedge {
    fn from(image: u32) -> Self {
        Wedge::single(image)
    }
}

impl TryFrom<(u32, u32)> for Wedge {
    type Error = OrchestratorError;

    fn try_from((start, end): (u32, u32)) -> Result<Self> {
        Wedge::new(start, end)
    }
}

impl std::fmt::Display for Wedge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}

/// Images of one sweep, with constant oscillation width
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    images: Vec<u32>,
    phi_start: f64,
    phi_width: f64,
}

impl ImageSet {
    pub fn new(mut images: Vec<u32>, phi_start: f64, phi_width: f64) -> Result<Self> {
        if !(phi_width.is_finite() && phi_width > 0.0) {
            return Err(OrchestratorError::invalid_input(format!(
                "phi width must be positive, got {}",
                phi_width
            )));
        }
        if !phi_start.is_finite() {
            return Err(OrchestratorError::invalid_input("phi start must be finite"));
        }

        images.sort_unstable();
        images.dedup();

        Ok(Self {
            images,
            phi_start,
            phi_width,
        })
    }

    /// Contiguous images `first..=last`
    pub fn contiguous(first: u32, last: u32, phi_start: f64, phi_width: f64) -> Result<Self> {
        Self::new((first..=last).collect(), phi_start, phi_width)
    }

    pub fn images(&self) -> &[u32] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn phi_start(&self) -> f64 {
        self.phi_start
    }

    pub fn phi_width(&self) -> f64 {
        self.phi_width
    }

    pub fn first(&self) -> Option<u32> {
        self.images.first().copied()
    }

    pub fn last(&self) -> Option<u32> {
        self.images.last().copied()
    }

    pub fn contains(&self, image: u32) -> bool {
        self.images.binary_search(&image).is_ok()
    }

    /// Rotation angle at the start of `image`
    pub fn angle_of(&self, image: u32) -> Option<f64> {
        let first = self.first()?;
        if image < first {
            return None;
        }
        Some(self.phi_start + (image - first) as f64 * self.phi_width)
    }

    /// Whether `wedge` lies inside `first..=last`
    pub fn covers(&self, wedge: &Wedge) -> bool {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => wedge.start >= first && wedge.end <= last,
            _ => false,
        }
    }

    /// A copy of this set with `more` images added
    pub fn appended(&self, more: &[u32]) -> Self {
        let mut images = self.images.clone();
        images.extend_from_slice(more);
        images.sort_unstable();
        images.dedup();

        Self {
            images,
            phi_start: self.phi_start,
            phi_width: self.phi_width,
        }
    }
}

/// Frame and angle the engine uses as its rotation reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartingReference {
    pub frame: u32,
    pub angle: f64,
}

/// Inputs to one indexing run
#[derive(Debug, Clone)]
pub struct IndexingRequest {
    images: Arc<ImageSet>,
    wedges: Vec<Wedge>,
    background_range: Option<Wedge>,
    target_lattice: Option<Lattice>,
    target_cell: Option<UnitCell>,
    user_forced: bool,
}

impl IndexingRequest {
    pub fn new(images: Arc<ImageSet>) -> Self {
        Self {
            images,
            wedges: Vec::new(),
            background_range: None,
            target_lattice: None,
            target_cell: None,
            user_forced: false,
        }
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    pub fn wedges(&self) -> &[Wedge] {
        &self.wedges
    }

    pub fn target_lattice(&self) -> Option<Lattice> {
        self.target_lattice
    }

    pub fn target_cell(&self) -> Option<UnitCell> {
        self.target_cell
    }

    pub fn user_forced(&self) -> bool {
        self.user_forced
    }

    /// Images used for background estimation; the first wedge unless set.
    pub fn background_range(&self) -> Option<Wedge> {
        self.background_range.or_else(|| self.wedges.first().copied())
    }

    /// Full data range of the sweep
    pub fn data_range(&self) -> Option<Wedge> {
        match (self.images.first(), self.images.last()) {
            (Some(first), Some(last)) => Some(Wedge {
                start: first,
                end: last,
            }),
            _ => None,
        }
    }

    /// The first wedge anchors the rotation angle of the whole request.
    pub fn starting_reference(&self) -> Option<StartingReference> {
        let frame = self.wedges.first()?.start;
        let angle = self.images.angle_of(frame)?;
        Some(StartingReference { frame, angle })
    }

    pub(crate) fn check_wedge(&self, wedge: &Wedge) -> Result<()> {
        if self.images.covers(wedge) {
            Ok(())
        } else {
            Err(OrchestratorError::invalid_input(format!(
                "wedge {} lies outside images {:?} -> {:?}",
                wedge,
                self.images.first(),
                self.images.last()
            )))
        }
    }

    pub(crate) fn push_wedge(&mut self, wedge: Wedge) -> Result<()> {
        self.check_wedge(&wedge)?;
        self.wedges.push(wedge);
        Ok(())
    }

    pub(crate) fn replace_wedges(&mut self, wedges: Vec<Wedge>) -> Result<()> {
        for wedge in &wedges {
            self.check_wedge(wedge)?;
        }
        self.wedges = wedges;
        Ok(())
    }

    pub(crate) fn set_background_range(&mut self, wedge: Option<Wedge>) -> Result<()> {
        if let Some(w) = &wedge {
            self.check_wedge(w)?;
        }
        self.background_range = wedge;
        Ok(())
    }

    pub(crate) fn set_images(&mut self, images: Arc<ImageSet>) {
        self.images = images;
    }

    pub(crate) fn set_target_lattice(&mut self, lattice: Option<Lattice>) {
        self.target_lattice = lattice;
    }

    pub(crate) fn set_target_cell(&mut self, cell: Option<UnitCell>) {
        self.target_cell = cell;
    }

    pub(crate) fn set_user_forced(&mut self, forced: bool) {
        self.user_forced = forced;
    }
}

/// Opaque reference to an artefact owned by the engine (usually a file path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadHandle(String);

impl PayloadHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PayloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Payload = BTreeMap<String, PayloadHandle>;

/// Candidate (lattice, cell) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeCandidate {
    pub lattice: Lattice,
    pub cell: UnitCell,
}

/// What the engine hands back from a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingSolution {
    pub lattice: Lattice,
    pub cell: UnitCell,
    pub mosaic: f64,
    pub payload: Payload,
    pub refined_beam: Option<(f64, f64)>,
    pub refined_distance: Option<f64>,
    /// Other lattices the engine considered, best first
    pub alternatives: Vec<LatticeCandidate>,
}

impl IndexingSolution {
    pub fn new(lattice: Lattice, cell: UnitCell, mosaic: f64) -> Self {
        Self {
            lattice,
            cell,
            mosaic,
            payload: Payload::new(),
            refined_beam: None,
            refined_distance: None,
            alternatives: Vec::new(),
        }
    }

    pub fn with_payload(mut self, role: impl Into<String>, handle: PayloadHandle) -> Self {
        self.payload.insert(role.into(), handle);
        self
    }

    pub fn payload_entry(&self, role: &str) -> Result<&PayloadHandle> {
        self.payload
            .get(role)
            .ok_or_else(|| OrchestratorError::MissingPayload(role.to_string()))
    }
}

/// Accepted outcome of a `get()`; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingResult {
    pub run_id: Uuid,
    pub lattice: Lattice,
    pub cell: UnitCell,
    pub mosaic: f64,
    pub payload: Payload,
    pub low_resolution_limit: Option<f64>,
    pub refined_beam: Option<(f64, f64)>,
    pub refined_distance: Option<f64>,
    pub alternatives: Vec<LatticeCandidate>,
    pub attempts: u32,
    pub continued: bool,
    pub replacements: u32,
    pub completed_at: DateTime<Utc>,
}

impl IndexingResult {
    pub fn payload(&self, role: &str) -> Option<&PayloadHandle> {
        self.payload.get(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(p: [f64; 6]) -> UnitCell {
        UnitCell::new(p).unwrap()
    }

    #[test]
    fn test_lattice_symbols() {
        for symbol in [
            "aP", "mP", "mC", "oP", "oC", "oI", "oF", "tP", "tI", "hP", "hR", "cP", "cI", "cF",
        ] {
            assert_eq!(Lattice::from_str(symbol).unwrap().as_str(), symbol);
        }
        assert!(Lattice::from_str("xP").is_err());
    }

    #[test]
    fn test_unit_cell_rejects_bad_parameters() {
        assert!(UnitCell::new([0.0, 10.0, 10.0, 90.0, 90.0, 90.0]).is_err());
        assert!(UnitCell::new([10.0, 10.0, 10.0, 180.0, 90.0, 90.0]).is_err());
        assert!(UnitCell::new([10.0, 10.0, f64::NAN, 90.0, 90.0, 90.0]).is_err());
    }

    #[test]
    fn test_cell_agreement() {
        let target = cell([10.0, 10.0, 10.0, 90.0, 90.0, 90.0]);

        assert!(cell([10.1, 10.0, 10.0, 90.0, 90.0, 90.0]).agrees_with(&target, 0.02, 2.0));
        assert!(!cell([10.5, 10.0, 10.0, 90.0, 90.0, 90.0]).agrees_with(&target, 0.02, 2.0));
        assert!(cell([10.0, 10.0, 10.0, 91.5, 90.0, 90.0]).agrees_with(&target, 0.02, 2.0));
        assert!(!cell([10.0, 10.0, 10.0, 90.0, 92.5, 90.0]).agrees_with(&target, 0.02, 2.0));
    }

    #[test]
    fn test_wedge_from_image_and_pair() {
        assert_eq!(Wedge::from(7), Wedge { start: 7, end: 7 });
        assert_eq!(Wedge::try_from((3, 9)).unwrap().len(), 7);
        assert!(Wedge::try_from((9, 3)).is_err());
    }

    #[test]
    fn test_image_set_sorted_and_angles() {
        let images = ImageSet::new(vec![5, 3, 4, 4], 10.0, 0.5).unwrap();

        assert_eq!(images.images(), &[3, 4, 5]);
        assert_eq!(images.angle_of(5), Some(11.0));
        assert_eq!(images.angle_of(2), None);
        assert!(ImageSet::new(vec![1], 0.0, 0.0).is_err());
    }

    #[test]
    fn test_request_starting_reference_uses_first_wedge() {
        let images = Arc::new(ImageSet::contiguous(1, 100, 30.0, 1.0).unwrap());
        let mut request = IndexingRequest::new(images);

        request.push_wedge(Wedge::new(46, 50).unwrap()).unwrap();
        request.push_wedge(Wedge::new(1, 5).unwrap()).unwrap();

        let reference = request.starting_reference().unwrap();
        assert_eq!(reference.frame, 46);
        assert_eq!(reference.angle, 75.0);
        assert_eq!(request.background_range(), Some(Wedge { start: 46, end: 50 }));
    }

    #[test]
    fn test_request_rejects_wedge_outside_images() {
        let images = Arc::new(ImageSet::contiguous(1, 10, 0.0, 1.0).unwrap());
        let mut request = IndexingRequest::new(images);

        assert!(request.push_wedge(Wedge::new(8, 12).unwrap()).is_err());
        assert!(request.wedges().is_empty());
    }
}
