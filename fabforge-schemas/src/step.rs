use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameter key read by the thermal budget tracker.
pub const TEMPERATURE_PARAM: &str = "temperature";

/// Parameter key written by the recovery manager on the first retry.
pub const RETRY_COUNT_PARAM: &str = "retry_count";

/// Optional per-step override of the scheduler's step timeout, in seconds.
pub const TIMEOUT_PARAM: &str = "timeout_secs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
    Paused,
    Cancelled,
}

impl StepStatus {
    /// Terminal states never transition again within a run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped | StepStatus::Cancelled
        )
    }

    /// A step counts as successful for the recipe when it completed or was skipped.
    pub fn is_successful(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Ready => "READY",
            StepStatus::Running => "RUNNING",
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
            StepStatus::Paused => "PAUSED",
            StepStatus::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// A single fabrication operation inside a recipe.
///
/// Times are in seconds. `process_type` is an opaque tag routed to the
/// physics collaborator ("oxidation", "implant", "anneal", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessStep {
    pub id: String,
    pub name: String,
    pub process_type: String,
    #[serde(default)]
    pub parameters: HashMap<String, f64>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub status: StepStatus,
    pub estimated_time: f64,
    #[serde(default)]
    pub actual_time: f64,
    #[serde(default)]
    pub results: HashMap<String, f64>,
}

impl ProcessStep {
    pub fn new(id: impl Into<String>, process_type: impl Into<String>, estimated_time: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            process_type: process_type.into(),
            parameters: HashMap::new(),
            prerequisites: Vec::new(),
            status: StepStatus::Pending,
            estimated_time,
            actual_time: 0.0,
            results: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_prerequisite(mut self, step_id: impl Into<String>) -> Self {
        self.prerequisites.push(step_id.into());
        self
    }

    /// Process temperature in °C, or 0 when the step declares none.
    pub fn temperature(&self) -> f64 {
        self.parameters.get(TEMPERATURE_PARAM).copied().unwrap_or(0.0)
    }

    pub fn retry_count(&self) -> Option<f64> {
        self.parameters.get(RETRY_COUNT_PARAM).copied()
    }

    /// Clears run state so the step can be executed again from PENDING.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.actual_time = 0.0;
        self.results.clear();
    }
}
