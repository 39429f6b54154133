//! Scripted collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use autoindex_orchestration::{
    roles, CentringAnalysis, FailureReport, IndexingEngine, IndexingRequest, IndexingSolution,
    Lattice, LowResolutionEstimator, PayloadHandle, UnitCell, Wedge,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn cell(p: [f64; 6]) -> UnitCell {
    UnitCell::new(p).unwrap()
}

/// Successful engine answer carrying both well-known payload roles
pub fn solution(lattice: Lattice, p: [f64; 6]) -> IndexingSolution {
    IndexingSolution::new(lattice, cell(p), 0.15)
        .with_payload(roles::ORIENTATION, PayloadHandle::new("GXPARM.XDS"))
        .with_payload(roles::SPOT_LIST, PayloadHandle::new("SPOT.XDS"))
}

/// What the engine saw on one invocation
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub resume: bool,
    pub wedges: Vec<Wedge>,
    pub target_lattice: Option<Lattice>,
    pub target_cell: Option<UnitCell>,
    pub user_forced: bool,
}

type Outcome = Result<IndexingSolution, FailureReport>;

/// Engine that replays a queue of outcomes, then repeats `fallback`
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    calls: Mutex<Vec<EngineCall>>,
    first_call_delay: Option<Duration>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Outcome>, fallback: Outcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
            first_call_delay: None,
        }
    }

    /// The first invocation sleeps for `delay` before answering
    pub fn with_first_call_delay(mut self, delay: Duration) -> Self {
        self.first_call_delay = Some(delay);
        self
    }

    /// Always succeeds with `solution`
    pub fn succeeding(solution: IndexingSolution) -> Self {
        Self::new(vec![], Ok(solution))
    }

    /// Always fails with `diagnostic`
    pub fn failing(diagnostic: &str) -> Self {
        Self::new(vec![], Err(FailureReport::from_diagnostic(diagnostic)))
    }

    pub fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn resume_flags(&self) -> Vec<bool> {
        self.calls().iter().map(|c| c.resume).collect()
    }
}

#[async_trait]
impl IndexingEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run_indexing(
        &self,
        request: &IndexingRequest,
        resume_from_partial: bool,
    ) -> Result<IndexingSolution, FailureReport> {
        let first = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(EngineCall {
                resume: resume_from_partial,
                wedges: request.wedges().to_vec(),
                target_lattice: request.target_lattice(),
                target_cell: request.target_cell(),
                user_forced: request.user_forced(),
            });
            calls.len() == 1
        };

        if let (true, Some(delay)) = (first, self.first_call_delay) {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Centring analysis with a fixed answer
pub struct FixedCentring {
    lattice: Lattice,
    cell: UnitCell,
    calls: AtomicUsize,
}

impl FixedCentring {
    pub fn new(lattice: Lattice, p: [f64; 6]) -> Self {
        Self {
            lattice,
            cell: cell(p),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CentringAnalysis for FixedCentring {
    async fn analyse(
        &self,
        _orientation: &PayloadHandle,
        _spot_list: &PayloadHandle,
    ) -> anyhow::Result<(Lattice, UnitCell)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.lattice, self.cell))
    }
}

/// Estimator returning a fixed largest d-spacing, or failing when `None`
pub struct FixedEstimator(pub Option<f64>);

#[async_trait]
impl LowResolutionEstimator for FixedEstimator {
    async fn max_d_spacing(
        &self,
        spot_list: &PayloadHandle,
        _geometry: &PayloadHandle,
    ) -> anyhow::Result<f64> {
        self.0
            .ok_or_else(|| anyhow::anyhow!("cannot read {}", spot_list))
    }
}
