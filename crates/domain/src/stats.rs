//! Engine-wide statistics derived from rules and executions.

use serde::{Deserialize, Serialize};

use crate::execution::{AutomationExecution, ExecutionStatus};
use crate::rule::AutomationRule;

/// Default credit per successful execution used by the `time_saved` estimate.
pub const DEFAULT_TIME_SAVED_PER_EXECUTION_SECS: u64 = 30;

/// Aggregate view over the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_rules: usize,
    pub active_rules: usize,
    pub total_executions: usize,
    pub successful_executions: usize,
    pub failed_executions: usize,
    /// Mean duration over executions that have one, in milliseconds.
    pub average_execution_time_ms: f64,
    /// Estimate only: a flat credit per successful execution, not a
    /// measurement.
    pub time_saved_secs: u64,
}

impl EngineStats {
    /// Compute statistics. Executions without a duration are excluded from
    /// the average rather than counted as zero.
    #[must_use]
    pub fn compute<'a>(
        rules: &[AutomationRule],
        executions: impl IntoIterator<Item = &'a AutomationExecution>,
        time_saved_per_execution_secs: u64,
    ) -> Self {
        let mut total_executions = 0;
        let mut successful_executions = 0;
        let mut failed_executions = 0;
        let mut duration_sum: u64 = 0;
        let mut duration_count: u32 = 0;

        for execution in executions {
            total_executions += 1;
            match execution.status {
                ExecutionStatus::Completed => successful_executions += 1,
                ExecutionStatus::Failed => failed_executions += 1,
                _ => {}
            }
            if let Some(duration) = execution.duration_ms {
                duration_sum = duration_sum.saturating_add(duration);
                duration_count += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let average_execution_time_ms = if duration_count == 0 {
            0.0
        } else {
            duration_sum as f64 / f64::from(duration_count)
        };

        Self {
            total_rules: rules.len(),
            active_rules: rules.iter().filter(|rule| rule.is_active).count(),
            total_executions,
            successful_executions,
            failed_executions,
            average_execution_time_ms,
            time_saved_secs: (successful_executions as u64)
                .saturating_mul(time_saved_per_execution_secs),
        }
    }
}
