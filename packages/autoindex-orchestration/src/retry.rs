use crate::classifier::ErrorClassifier;
use crate::config::RetryPolicy;
use crate::engine::IndexingEngine;
use crate::error::{FailureCategory, OrchestratorError, Result};
use crate::model::{IndexingRequest, IndexingSolution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Retry loop state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetryState {
    Idle,
    Running {
        started_at: DateTime<Utc>,
        attempt: u32,
        resumed: bool,
    },
    Continuing {
        started_at: DateTime<Utc>,
        attempt: u32,
        diagnostic: String,
    },
    Succeeded {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration_ms: u64,
        attempts: u32,
    },
    Failed {
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
        attempts: u32,
        diagnostic: String,
        category: FailureCategory,
    },
}

impl RetryState {
    pub fn state_name(&self) -> &'static str {
        match self {
            RetryState::Idle => "idle",
            RetryState::Running { .. } => "running",
            RetryState::Continuing { .. } => "continuing",
            RetryState::Succeeded { .. } => "succeeded",
            RetryState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded { .. } | RetryState::Failed { .. })
    }
}

/// Successful outcome of the retry loop
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub solution: IndexingSolution,
    pub attempts: u32,
    /// Whether any continue-from-error step was needed
    pub continued: bool,
}

/// Drives the engine until success, fatal failure or the continuation bound
pub struct RetryController {
    state: RetryState,
    classifier: ErrorClassifier,
    policy: RetryPolicy,
    continuations: u32,
}

impl RetryController {
    pub fn new(classifier: ErrorClassifier, policy: RetryPolicy) -> Self {
        Self {
            state: RetryState::Idle,
            classifier,
            policy,
            continuations: 0,
        }
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn continuations(&self) -> u32 {
        self.continuations
    }

    fn invalid(&self, to: &str) -> OrchestratorError {
        OrchestratorError::InvalidStateTransition {
            from: self.state.state_name().to_string(),
            to: to.to_string(),
        }
    }

    /// Transition: SUCCEEDED | FAILED → IDLE
    pub fn reset(&mut self) -> Result<()> {
        match &self.state {
            RetryState::Idle | RetryState::Succeeded { .. } | RetryState::Failed { .. } => {
                self.state = RetryState::Idle;
                self.continuations = 0;
                Ok(())
            }
            _ => Err(self.invalid("idle")),
        }
    }

    /// Transition: IDLE → RUNNING
    pub fn start(&mut self) -> Result<()> {
        match &self.state {
            RetryState::Idle => {
                self.state = RetryState::Running {
                    started_at: Utc::now(),
                    attempt: 1,
                    resumed: false,
                };
                Ok(())
            }
            _ => Err(self.invalid("running")),
        }
    }

    /// Transition: RUNNING → CONTINUING
    pub fn continue_from(&mut self, diagnostic: String) -> Result<()> {
        match &self.state {
            RetryState::Running {
                started_at,
                attempt,
                ..
            } => {
                self.state = RetryState::Continuing {
                    started_at: *started_at,
                    attempt: *attempt,
                    diagnostic,
                };
                self.continuations += 1;
                Ok(())
            }
            _ => Err(self.invalid("continuing")),
        }
    }

    /// Transition: CONTINUING → RUNNING (resumed from the partial result)
    pub fn resume(&mut self) -> Result<()> {
        match &self.state {
            RetryState::Continuing {
                started_at,
                attempt,
                ..
            } => {
                self.state = RetryState::Running {
                    started_at: *started_at,
                    attempt: attempt + 1,
                    resumed: true,
                };
                Ok(())
            }
            _ => Err(self.invalid("running (resume)")),
        }
    }

    /// Transition: RUNNING → SUCCEEDED
    pub fn succeed(&mut self) -> Result<()> {
        match &self.state {
            RetryState::Running {
                started_at,
                attempt,
                ..
            } => {
                let now = Utc::now();
                let duration_ms = (now - *started_at).num_milliseconds().max(0) as u64;
                self.state = RetryState::Succeeded {
                    started_at: *started_at,
                    finished_at: now,
                    duration_ms,
                    attempts: *attempt,
                };
                Ok(())
            }
            _ => Err(self.invalid("succeeded")),
        }
    }

    /// Transition: RUNNING | CONTINUING → FAILED
    pub fn fail(&mut self, diagnostic: String, category: FailureCategory) -> Result<()> {
        match &self.state {
            RetryState::Running {
                started_at,
                attempt,
                ..
            }
            | RetryState::Continuing {
                started_at,
                attempt,
                ..
            } => {
                self.state = RetryState::Failed {
                    started_at: *started_at,
                    failed_at: Utc::now(),
                    attempts: *attempt,
                    diagnostic,
                    category,
                };
                Ok(())
            }
            _ => Err(self.invalid("failed")),
        }
    }

    /// Back to IDLE from any state. A run whose future was dropped
    /// mid-attempt leaves RUNNING or CONTINUING behind.
    fn restart(&mut self) {
        if !matches!(self.state, RetryState::Idle) && !self.state.is_terminal() {
            warn!(
                "Abandoning interrupted run in state {}",
                self.state.state_name()
            );
        }
        self.state = RetryState::Idle;
        self.continuations = 0;
    }

    fn attempt(&self) -> u32 {
        match &self.state {
            RetryState::Running { attempt, .. } | RetryState::Continuing { attempt, .. } => {
                *attempt
            }
            RetryState::Succeeded { attempts, .. } | RetryState::Failed { attempts, .. } => {
                *attempts
            }
            RetryState::Idle => 0,
        }
    }

    /// Run the engine to completion for `request`
    pub async fn run(
        &mut self,
        engine: &dyn IndexingEngine,
        request: &IndexingRequest,
    ) -> Result<RetryOutcome> {
        self.restart();
        self.start()?;

        let target_cell = request.target_cell();
        let mut resume = false;

        loop {
            let attempt = self.attempt();
            debug!(
                "{}: indexing attempt {} (resume: {})",
                engine.name(),
                attempt,
                resume
            );

            let report = match engine.run_indexing(request, resume).await {
                Ok(solution) => {
                    self.succeed()?;
                    info!(
                        "{}: indexed as {} {} after {} attempt(s)",
                        engine.name(),
                        solution.lattice,
                        solution.cell,
                        attempt
                    );
                    return Ok(RetryOutcome {
                        solution,
                        attempts: attempt,
                        continued: self.continuations > 0,
                    });
                }
                Err(report) => report,
            };

            let category = self.classifier.classify(&report, target_cell.as_ref());
            info!(
                "{}: attempt {} failed ({}, {}): {}",
                engine.name(),
                attempt,
                report.kind.as_str(),
                category,
                report.diagnostic
            );

            match category {
                FailureCategory::RetryableContinue
                    if self.continuations < self.policy.max_continuations =>
                {
                    self.continue_from(report.diagnostic)?;
                    self.resume()?;
                    resume = true;
                }
                FailureCategory::RetryableContinue => {
                    warn!(
                        "{}: giving up after {} continuation(s)",
                        engine.name(),
                        self.continuations
                    );
                    self.fail(report.diagnostic.clone(), category)?;
                    return Err(OrchestratorError::RetryLimitExceeded {
                        attempts: attempt,
                        diagnostic: report.diagnostic,
                    });
                }
                _ => {
                    error!("{}: fatal indexing failure", engine.name());
                    self.fail(report.diagnostic.clone(), FailureCategory::Fatal)?;
                    return Err(OrchestratorError::IndexingFailed {
                        diagnostic: report.diagnostic,
                        category: FailureCategory::Fatal,
                    });
                }
            }
        }
    }
}
