use crate::config::TolerancePolicy;
use crate::diagnostics::{FailureKind, FailureReport};
use crate::error::FailureCategory;
use crate::model::UnitCell;
use tracing::debug;

/// Turns failure reports into retry decisions
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    tolerance: TolerancePolicy,
}

impl ErrorClassifier {
    pub fn new(tolerance: TolerancePolicy) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> &TolerancePolicy {
        &self.tolerance
    }

    /// Category from the failure kind alone
    pub fn categorize(&self, report: &FailureReport) -> FailureCategory {
        match report.kind {
            FailureKind::SolutionInaccurate => FailureCategory::RetryableContinue,
            FailureKind::InsufficientIndexed { .. } => FailureCategory::RetryableIfCellClose,
            FailureKind::Other => FailureCategory::Fatal,
        }
    }

    /// Final category: `RetryableIfCellClose` is resolved against `target_cell`.
    pub fn classify(
        &self,
        report: &FailureReport,
        target_cell: Option<&UnitCell>,
    ) -> FailureCategory {
        match self.categorize(report) {
            FailureCategory::RetryableIfCellClose => self.resolve_cell_check(report, target_cell),
            category => category,
        }
    }

    fn resolve_cell_check(
        &self,
        report: &FailureReport,
        target_cell: Option<&UnitCell>,
    ) -> FailureCategory {
        let Some(target) = target_cell else {
            debug!("Engine unhappy but solution probably ok (no target cell)");
            return FailureCategory::RetryableContinue;
        };

        if self.tolerance.relax {
            debug!("Engine unhappy, relaxed tolerance - continuing");
            return FailureCategory::RetryableContinue;
        }

        let agrees = report.proposed_cell.as_ref().is_some_and(|cell| {
            cell.agrees_with(
                target,
                self.tolerance.length_fraction,
                self.tolerance.angle_degrees,
            )
        });

        if agrees {
            debug!("Engine unhappy but solution ok");
            FailureCategory::RetryableContinue
        } else {
            debug!(
                "Engine unhappy and solution wrong: proposed {:?}, target {}",
                report.proposed_cell.map(|c| c.to_string()),
                target
            );
            FailureCategory::Fatal
        }
    }
}
