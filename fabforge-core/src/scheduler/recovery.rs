use fabforge_schemas::step::{ProcessStep, StepStatus, RETRY_COUNT_PARAM, TIMEOUT_PARAM};

/// Single-shot retry policy for failed steps.
///
/// The retry marker lives in the step's own parameter map, so a step that
/// already carries `retry_count` is never retried again.
#[derive(Debug, Clone)]
pub struct RecoveryManager {
    parameter_scale: f64,
}

impl RecoveryManager {
    pub fn new(parameter_scale: f64) -> Self {
        Self { parameter_scale }
    }

    pub fn can_retry(&self, step: &ProcessStep) -> bool {
        step.retry_count().is_none()
    }

    /// Perturbs a failed step for its one retry and moves it back to READY.
    /// The `timeout_secs` override is not a process parameter and keeps its value.
    ///
    /// Returns `false`, leaving the step untouched, when it was retried before.
    pub fn prepare_retry(&self, step: &mut ProcessStep) -> bool {
        if !self.can_retry(step) {
            tracing::warn!(
                category = "recovery",
                step_id = %step.id,
                "Step already retried once; recovery exhausted"
            );
            return false;
        }

        for (key, value) in step.parameters.iter_mut() {
            if key != TIMEOUT_PARAM {
                *value *= self.parameter_scale;
            }
        }
        step.parameters.insert(RETRY_COUNT_PARAM.to_string(), 1.0);
        step.status = StepStatus::Ready;

        tracing::info!(
            category = "recovery",
            step_id = %step.id,
            scale = self.parameter_scale,
            "Retrying step with perturbed parameters"
        );
        true
    }
}
