use chrono::{DateTime, Utc};
use fabforge_schemas::{
    recipe::ProcessRecipe,
    step::{ProcessStep, StepStatus},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipeStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    StepStarted { step_id: String, attempt: u32 },
    StepCompleted { step_id: String, actual_time: f64 },
    StepFailed { step_id: String, reason: String },
    StepSkipped { step_id: String, missing: Vec<String> },
    StepRetried { step_id: String },
    StepCancelled { step_id: String },
    ThermalBudgetExceeded { step_id: String, projected: f64, limit: f64 },
    ParameterPropagated { source_step: String, target_step: String, parameter: String, value: f64 },
}

/// Per-run state. The recipe is a snapshot owned by the run, so step
/// statuses, retries and propagated parameters never leak back into the
/// registered definition.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub recipe: ProcessRecipe,
    pub runtime_parameters: HashMap<String, f64>,
    pub status: RecipeStatus,
    pub completed_steps: Vec<String>,
    pub executed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    pub skipped_steps: Vec<String>,
    pub recovered_steps: Vec<String>,
    pub measured_results: HashMap<String, HashMap<String, f64>>,
    pub warnings: Vec<String>,
    pub events: Vec<ExecutionEvent>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(
        execution_id: String,
        recipe: &ProcessRecipe,
        runtime_parameters: HashMap<String, f64>,
    ) -> Self {
        let mut recipe = recipe.clone();
        recipe.steps.iter_mut().for_each(ProcessStep::reset);
        Self {
            execution_id,
            recipe,
            runtime_parameters,
            status: RecipeStatus::Running,
            completed_steps: Vec::new(),
            executed_steps: Vec::new(),
            failed_steps: Vec::new(),
            skipped_steps: Vec::new(),
            recovered_steps: Vec::new(),
            measured_results: HashMap::new(),
            warnings: Vec::new(),
            events: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Step parameters with run-level overrides applied on top.
    pub fn merged_parameters(&self, step: &ProcessStep) -> HashMap<String, f64> {
        let mut merged = step.parameters.clone();
        merged.extend(self.runtime_parameters.iter().map(|(k, v)| (k.clone(), *v)));
        merged
    }

    /// Number of times the step was started during this run.
    pub fn attempts(&self, step_id: &str) -> u32 {
        self.events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::StepStarted { step_id: id, .. } if id == step_id))
            .count() as u32
    }

    pub fn steps_with_status(&self, status: StepStatus) -> impl Iterator<Item = &ProcessStep> {
        self.recipe.steps.iter().filter(move |s| s.status == status)
    }
}

/// Final state of one step after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub process_type: String,
    pub status: StepStatus,
    pub attempts: u32,
    pub actual_time: f64,
    pub parameters: HashMap<String, f64>,
    pub results: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeExecutionResult {
    pub execution_id: String,
    pub recipe_id: String,
    pub status: RecipeStatus,
    pub steps: Vec<StepRecord>,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    pub skipped_steps: Vec<String>,
    pub recovered_steps: Vec<String>,
    pub warnings: Vec<String>,
    pub thermal_budget_used: f64,
    /// Sum of measured step times, in seconds.
    pub total_time: f64,
    pub measured_results: HashMap<String, HashMap<String, f64>>,
    pub events: Vec<ExecutionEvent>,
}

impl RecipeExecutionResult {
    pub fn from_context(context: &ExecutionContext, thermal_budget_used: f64) -> Self {
        let steps = context
            .recipe
            .steps
            .iter()
            .map(|s| StepRecord {
                step_id: s.id.clone(),
                process_type: s.process_type.clone(),
                status: s.status,
                attempts: context.attempts(&s.id),
                actual_time: s.actual_time,
                parameters: s.parameters.clone(),
                results: s.results.clone(),
            })
            .collect();

        Self {
            execution_id: context.execution_id.clone(),
            recipe_id: context.recipe.id.clone(),
            status: context.status,
            steps,
            completed_steps: context.completed_steps.clone(),
            failed_steps: context.failed_steps.clone(),
            skipped_steps: context.skipped_steps.clone(),
            recovered_steps: context.recovered_steps.clone(),
            warnings: context.warnings.clone(),
            thermal_budget_used,
            total_time: context.recipe.steps.iter().map(|s| s.actual_time).sum(),
            measured_results: context.measured_results.clone(),
            events: context.events.clone(),
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn is_success(&self) -> bool {
        self.status == RecipeStatus::Completed
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_resets_steps_and_overrides_win() {
        let mut step = fabforge_schemas::step::ProcessStep::new("ox", "oxidation", 100.0)
            .with_parameter("temperature", 900.0)
            .with_parameter("pressure", 1.0);
        step.status = StepStatus::Completed;
        step.actual_time = 12.0;
        let recipe = ProcessRecipe::new("r", "r", 1.0e6).with_step(step);

        let overrides = HashMap::from([("temperature".to_string(), 950.0)]);
        let ctx = ExecutionContext::new("r_1".into(), &recipe, overrides);

        let snapshot = &ctx.recipe.steps[0];
        assert_eq!(snapshot.status, StepStatus::Pending);
        assert_eq!(snapshot.actual_time, 0.0);

        let merged = ctx.merged_parameters(snapshot);
        assert_eq!(merged["temperature"], 950.0);
        assert_eq!(merged["pressure"], 1.0);
        assert_eq!(recipe.steps[0].status, StepStatus::Completed);
    }
}
