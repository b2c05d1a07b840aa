//! Thermal budget accounting (°C·s) over a run.

use super::context::ExecutionContext;
use fabforge_schemas::step::{ProcessStep, StepStatus, TEMPERATURE_PARAM};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalCheck {
    pub current: f64,
    pub additional: f64,
    pub limit: f64,
}

impl ThermalCheck {
    pub fn projected(&self) -> f64 {
        self.current + self.additional
    }

    pub fn within_limit(&self) -> bool {
        self.projected() <= self.limit
    }
}

#[derive(Debug, Clone)]
pub struct ThermalBudgetTracker {
    default_limit: f64,
}

impl ThermalBudgetTracker {
    /// `default_limit` applies to recipes declaring a non-positive limit.
    pub fn new(default_limit: f64) -> Self {
        Self { default_limit }
    }

    pub fn limit_for(&self, context: &ExecutionContext) -> f64 {
        let declared = context.recipe.thermal_budget_limit;
        if declared > 0.0 {
            declared
        } else {
            self.default_limit
        }
    }

    /// Temperature the step actually runs at: a run-level override wins
    /// over the step's own parameter.
    pub fn effective_temperature(context: &ExecutionContext, step: &ProcessStep) -> f64 {
        context
            .runtime_parameters
            .get(TEMPERATURE_PARAM)
            .copied()
            .unwrap_or_else(|| step.temperature())
    }

    /// Σ temperature × actual_time over COMPLETED steps only.
    pub fn calculate_thermal_budget(&self, context: &ExecutionContext) -> f64 {
        context
            .recipe
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| Self::effective_temperature(context, s) * s.actual_time)
            .sum()
    }

    /// Projects the budget after `step`, costed with its estimated time.
    pub fn check_thermal_budget_limit(&self, context: &ExecutionContext, step: &ProcessStep) -> ThermalCheck {
        ThermalCheck {
            current: self.calculate_thermal_budget(context),
            additional: Self::effective_temperature(context, step) * step.estimated_time,
            limit: self.limit_for(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabforge_schemas::recipe::ProcessRecipe;
    use std::collections::HashMap;

    fn context_with(statuses: &[(StepStatus, f64, f64)], limit: f64) -> ExecutionContext {
        let mut recipe = ProcessRecipe::new("r", "r", limit);
        for (i, (_, temperature, _)) in statuses.iter().enumerate() {
            recipe.add_step(
                ProcessStep::new(format!("s{}", i), "anneal", 10.0).with_parameter("temperature", *temperature),
            );
        }
        let mut ctx = ExecutionContext::new("r_1".into(), &recipe, HashMap::new());
        for (step, (status, _, actual)) in ctx.recipe.steps.iter_mut().zip(statuses) {
            step.status = *status;
            step.actual_time = *actual;
        }
        ctx
    }

    #[test]
    fn only_completed_steps_accrue() {
        let ctx = context_with(
            &[
                (StepStatus::Completed, 1000.0, 2.0),
                (StepStatus::Failed, 900.0, 5.0),
                (StepStatus::Skipped, 800.0, 0.0),
                (StepStatus::Completed, 500.0, 4.0),
                (StepStatus::Pending, 700.0, 3.0),
            ],
            1.0e6,
        );
        let tracker = ThermalBudgetTracker::new(1.0e6);
        assert_eq!(tracker.calculate_thermal_budget(&ctx), 1000.0 * 2.0 + 500.0 * 4.0);
    }

    #[test]
    fn check_uses_estimated_time() {
        let ctx = context_with(&[(StepStatus::Completed, 1000.0, 2.0), (StepStatus::Pending, 1000.0, 0.0)], 11_000.0);
        let tracker = ThermalBudgetTracker::new(1.0e6);
        let check = tracker.check_thermal_budget_limit(&ctx, &ctx.recipe.steps[1]);
        assert_eq!(check.current, 2000.0);
        assert_eq!(check.additional, 10_000.0);
        assert!(!check.within_limit());

        let check = tracker.check_thermal_budget_limit(&ctx, &ProcessStep::new("cool", "anneal", 10.0));
        assert!(check.within_limit());
    }

    #[test]
    fn runtime_temperature_override_is_costed() {
        let mut ctx = context_with(&[(StepStatus::Completed, 1000.0, 2.0), (StepStatus::Pending, 1000.0, 0.0)], 1.0e6);
        ctx.runtime_parameters.insert(TEMPERATURE_PARAM.to_string(), 500.0);
        let tracker = ThermalBudgetTracker::new(1.0e6);
        assert_eq!(tracker.calculate_thermal_budget(&ctx), 500.0 * 2.0);
        let check = tracker.check_thermal_budget_limit(&ctx, &ctx.recipe.steps[1]);
        assert_eq!(check.additional, 500.0 * 10.0);
    }

    #[test]
    fn falls_back_to_default_limit() {
        let ctx = context_with(&[(StepStatus::Pending, 100.0, 0.0)], 0.0);
        let tracker = ThermalBudgetTracker::new(42.0);
        assert_eq!(tracker.limit_for(&ctx), 42.0);
    }
}
