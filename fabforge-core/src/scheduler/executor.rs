use super::{
    context::{ExecutionContext, ExecutionEvent, RecipeExecutionResult, RecipeStatus},
    propagation::{CrossProcessDependency, DependencyPropagator},
    recovery::RecoveryManager,
    resolver,
    thermal::ThermalBudgetTracker,
};
use crate::{
    error::{FabforgeError, FabforgeResult},
    logger::StepTraceLogger,
    physics::{PhysicsEvaluator, PhysicsOutcome},
    services::Services,
};
use chrono::Utc;
use fabforge_schemas::{
    recipe::{FlowType, ProcessRecipe},
    step::{StepStatus, TIMEOUT_PARAM},
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

/// Cooperative cancellation flag, checked between steps only.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives recipes through the step state machine against a physics collaborator.
///
/// Runs are synchronous. Callers must not run two recipes against the same
/// wafer at once; the wafer is borrowed mutably for the whole run.
pub struct RecipeExecutor<P: PhysicsEvaluator> {
    services: Services,
    physics: P,
    thermal: ThermalBudgetTracker,
    recovery: RecoveryManager,
    propagator: DependencyPropagator,
    recipes: HashMap<String, ProcessRecipe>,
    retained: HashMap<String, ExecutionContext>,
    pub(super) trace: Option<StepTraceLogger>,
    run_sequence: u64,
}

impl<P: PhysicsEvaluator> RecipeExecutor<P> {
    pub fn new(services: Services, physics: P) -> Self {
        let scheduler = &services.config().scheduler;
        let thermal = ThermalBudgetTracker::new(scheduler.default_thermal_budget_limit);
        let recovery = RecoveryManager::new(scheduler.retry_parameter_scale);
        Self {
            services,
            physics,
            thermal,
            recovery,
            propagator: DependencyPropagator::new(),
            recipes: HashMap::new(),
            retained: HashMap::new(),
            trace: None,
            run_sequence: 0,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn thermal_tracker(&self) -> &ThermalBudgetTracker {
        &self.thermal
    }

    // --- Recipe registry ---

    pub fn validate_recipe(&self, recipe: &ProcessRecipe) -> FabforgeResult<()> {
        resolver::validate_recipe(recipe, self.services.config().scheduler.strict_prerequisites)
    }

    /// Validates and stores a recipe under its id, replacing any previous one.
    pub fn register_recipe(&mut self, recipe: ProcessRecipe) -> FabforgeResult<()> {
        self.validate_recipe(&recipe)?;
        tracing::info!(category = "recipe", recipe_id = %recipe.id, steps = recipe.steps.len(), "Recipe registered");
        self.recipes.insert(recipe.id.clone(), recipe);
        Ok(())
    }

    pub fn recipe(&self, recipe_id: &str) -> FabforgeResult<&ProcessRecipe> {
        self.recipes
            .get(recipe_id)
            .ok_or_else(|| FabforgeError::RecipeNotFound(recipe_id.to_string()))
    }

    pub fn recipes(&self) -> impl Iterator<Item = &ProcessRecipe> {
        self.recipes.values()
    }

    pub fn add_dependency(&mut self, dependency: CrossProcessDependency) {
        self.propagator.register(dependency);
    }

    pub fn dependencies(&self) -> &[CrossProcessDependency] {
        self.propagator.dependencies()
    }

    /// Context of a failed or cancelled run, kept for diagnostics.
    pub fn execution(&self, execution_id: &str) -> FabforgeResult<&ExecutionContext> {
        self.retained
            .get(execution_id)
            .ok_or_else(|| FabforgeError::ExecutionNotFound(execution_id.to_string()))
    }

    pub fn retained_executions(&self) -> impl Iterator<Item = &ExecutionContext> {
        self.retained.values()
    }

    pub fn clear_retained(&mut self) {
        self.retained.clear();
    }

    // --- Execution ---

    /// Runs a registered recipe.
    pub fn execute_recipe(
        &mut self,
        recipe_id: &str,
        wafer: &mut P::Wafer,
        runtime_parameters: HashMap<String, f64>,
    ) -> FabforgeResult<RecipeExecutionResult> {
        let recipe = self.recipe(recipe_id)?.clone();
        self.execute(&recipe, wafer, runtime_parameters, None)
    }

    pub fn execute_recipe_with_cancellation(
        &mut self,
        recipe_id: &str,
        wafer: &mut P::Wafer,
        runtime_parameters: HashMap<String, f64>,
        cancellation: &CancellationToken,
    ) -> FabforgeResult<RecipeExecutionResult> {
        let recipe = self.recipe(recipe_id)?.clone();
        self.execute(&recipe, wafer, runtime_parameters, Some(cancellation))
    }

    /// Runs any recipe. Invalid recipes are rejected before a step starts.
    ///
    /// Step failures are reported through the result's status, never as `Err`.
    pub fn execute(
        &mut self,
        recipe: &ProcessRecipe,
        wafer: &mut P::Wafer,
        runtime_parameters: HashMap<String, f64>,
        cancellation: Option<&CancellationToken>,
    ) -> FabforgeResult<RecipeExecutionResult> {
        if let Err(e) = self.validate_recipe(recipe) {
            tracing::error!(category = "recipe", recipe_id = %recipe.id, code = e.code(), error = %e, "Recipe rejected");
            return Err(e);
        }

        let execution_id = self.next_execution_id(&recipe.id);
        let mut context = ExecutionContext::new(execution_id, recipe, runtime_parameters);
        tracing::info!(
            category = "recipe",
            execution_id = %context.execution_id,
            flow = ?recipe.flow_type,
            "Recipe execution started"
        );

        match recipe.flow_type {
            FlowType::Sequential => {}
            FlowType::Parallel | FlowType::Adaptive => {
                tracing::info!(
                    category = "recipe",
                    flow = ?recipe.flow_type,
                    "Flow type has no dedicated scheduler; executing sequentially"
                );
            }
        }
        self.execute_sequential(&mut context, wafer, cancellation);

        let thermal_budget = self.thermal.calculate_thermal_budget(&context);
        let result = RecipeExecutionResult::from_context(&context, thermal_budget);
        tracing::info!(
            category = "recipe",
            execution_id = %context.execution_id,
            status = ?context.status,
            completed = context.completed_steps.len(),
            skipped = context.skipped_steps.len(),
            thermal_budget,
            "Recipe execution finished"
        );

        if context.status != RecipeStatus::Completed {
            self.retained.insert(context.execution_id.clone(), context);
        }
        Ok(result)
    }

    fn next_execution_id(&mut self, recipe_id: &str) -> String {
        self.run_sequence += 1;
        format!(
            "{}_{}_{}",
            recipe_id,
            Utc::now().format("%Y%m%d_%H%M%S%3f"),
            self.run_sequence
        )
    }

    /// Declared-order execution; prerequisites are checked, not sorted.
    fn execute_sequential(
        &mut self,
        context: &mut ExecutionContext,
        wafer: &mut P::Wafer,
        cancellation: Option<&CancellationToken>,
    ) {
        let mut aborted = false;

        for index in 0..context.recipe.steps.len() {
            if cancellation.map_or(false, CancellationToken::is_cancelled) {
                self.cancel_remaining(context, index);
                context.status = RecipeStatus::Cancelled;
                return;
            }

            let step = &context.recipe.steps[index];
            if !resolver::prerequisites_met(step, &context.completed_steps) {
                let missing: Vec<String> = step
                    .prerequisites
                    .iter()
                    .filter(|p| !context.completed_steps.contains(p))
                    .cloned()
                    .collect();
                let step_id = step.id.clone();
                tracing::info!(category = "step", step_id = %step_id, ?missing, "Prerequisites not met; skipping");
                context.recipe.steps[index].status = StepStatus::Skipped;
                context.skipped_steps.push(step_id.clone());
                context.events.push(ExecutionEvent::StepSkipped { step_id, missing });
                self.trace_step(context, index);
                continue;
            }

            context.recipe.steps[index].status = StepStatus::Ready;
            self.check_thermal_budget(context, index);

            if self.execute_step(context, index, wafer) {
                continue;
            }
            if !self.recover_step(context, index, wafer) {
                aborted = true;
                break;
            }
        }

        context.status = if aborted {
            RecipeStatus::Failed
        } else if context.recipe.steps.iter().all(|s| s.status.is_successful()) {
            RecipeStatus::Completed
        } else {
            RecipeStatus::Failed
        };
    }

    fn check_thermal_budget(&self, context: &mut ExecutionContext, index: usize) {
        let step = &context.recipe.steps[index];
        let check = self.thermal.check_thermal_budget_limit(context, step);
        if check.within_limit() {
            return;
        }

        let message = format!(
            "Thermal budget limit would be exceeded by step '{}': projected {:.3e} > limit {:.3e}",
            step.id,
            check.projected(),
            check.limit
        );
        tracing::warn!(category = "thermal", step_id = %step.id, projected = check.projected(), limit = check.limit, "Thermal budget limit exceeded");
        let event = ExecutionEvent::ThermalBudgetExceeded {
            step_id: step.id.clone(),
            projected: check.projected(),
            limit: check.limit,
        };
        context.warnings.push(message);
        context.events.push(event);
    }

    /// RUNNING → COMPLETED | FAILED for one attempt. Returns whether it completed.
    fn execute_step(&mut self, context: &mut ExecutionContext, index: usize, wafer: &mut P::Wafer) -> bool {
        let (step_id, process_type, parameters, timeout) = {
            let step = &context.recipe.steps[index];
            let timeout = step
                .parameters
                .get(TIMEOUT_PARAM)
                .copied()
                .unwrap_or(self.services.config().scheduler.default_step_timeout_secs);
            (step.id.clone(), step.process_type.clone(), context.merged_parameters(step), timeout)
        };

        context.recipe.steps[index].status = StepStatus::Running;
        let attempt = context.attempts(&step_id) + 1;
        context.events.push(ExecutionEvent::StepStarted {
            step_id: step_id.clone(),
            attempt,
        });
        tracing::debug!(category = "step", step_id = %step_id, %process_type, attempt, "Step running");

        let start = Instant::now();
        let outcome = self.physics.execute(wafer, &process_type, &parameters);
        let elapsed = start.elapsed().as_secs_f64();
        context.recipe.steps[index].actual_time = elapsed;

        let enforce_timeout = self.services.config().scheduler.enforce_step_timeout;
        let failure = match outcome {
            Ok(PhysicsOutcome { success: true, .. }) if enforce_timeout && elapsed > timeout => {
                Some(format!("timed out after {:.3}s (limit {:.3}s)", elapsed, timeout))
            }
            Ok(PhysicsOutcome { success: true, results }) => {
                self.complete_step(context, index, results);
                None
            }
            Ok(PhysicsOutcome { success: false, .. }) => Some("physics evaluator reported failure".to_string()),
            Err(e) => {
                tracing::error!(category = "step", step_id = %step_id, error = %e, "Physics evaluator raised an error");
                Some(format!("physics evaluator error: {:#}", e))
            }
        };

        match failure {
            None => true,
            Some(reason) => {
                context.recipe.steps[index].status = StepStatus::Failed;
                if !context.failed_steps.contains(&step_id) {
                    context.failed_steps.push(step_id.clone());
                }
                tracing::warn!(category = "step", step_id = %step_id, %reason, "Step failed");
                context.events.push(ExecutionEvent::StepFailed { step_id, reason });
                self.trace_step(context, index);
                false
            }
        }
    }

    fn complete_step(&mut self, context: &mut ExecutionContext, index: usize, results: HashMap<String, f64>) {
        let step = &mut context.recipe.steps[index];
        step.status = StepStatus::Completed;
        step.results = results.clone();
        let step_id = step.id.clone();
        let actual_time = step.actual_time;

        context.completed_steps.push(step_id.clone());
        context.executed_steps.push(step_id.clone());
        context.failed_steps.retain(|id| id != &step_id);
        context.measured_results.insert(step_id.clone(), results);
        context.events.push(ExecutionEvent::StepCompleted {
            step_id: step_id.clone(),
            actual_time,
        });
        tracing::debug!(category = "step", step_id = %step_id, actual_time, "Step completed");
        self.trace_step(context, index);

        let report = self.propagator.propagate(&mut context.recipe, &step_id);
        for applied in report.applied {
            context.events.push(ExecutionEvent::ParameterPropagated {
                source_step: applied.source_step,
                target_step: applied.target_step,
                parameter: applied.parameter,
                value: applied.value,
            });
        }
        context.warnings.extend(report.warnings);
    }

    /// One perturbed retry through the normal execution path.
    fn recover_step(&mut self, context: &mut ExecutionContext, index: usize, wafer: &mut P::Wafer) -> bool {
        if !self.recovery.prepare_retry(&mut context.recipe.steps[index]) {
            tracing::error!(
                category = "recovery",
                step_id = %context.recipe.steps[index].id,
                "Recovery failed; aborting remaining steps"
            );
            return false;
        }

        let step_id = context.recipe.steps[index].id.clone();
        context.events.push(ExecutionEvent::StepRetried {
            step_id: step_id.clone(),
        });

        if self.execute_step(context, index, wafer) {
            context.recovered_steps.push(step_id);
            true
        } else {
            tracing::error!(category = "recovery", step_id = %step_id, "Retry failed; aborting remaining steps");
            false
        }
    }

    fn cancel_remaining(&mut self, context: &mut ExecutionContext, from: usize) {
        tracing::warn!(category = "recipe", execution_id = %context.execution_id, "Execution cancelled");
        for index in from..context.recipe.steps.len() {
            let step = &mut context.recipe.steps[index];
            step.status = StepStatus::Cancelled;
            let step_id = step.id.clone();
            context.events.push(ExecutionEvent::StepCancelled { step_id });
            self.trace_step(context, index);
        }
    }

    fn trace_step(&mut self, context: &ExecutionContext, index: usize) {
        let Some(trace) = self.trace.as_mut() else {
            return;
        };
        let budget = self.thermal.calculate_thermal_budget(context);
        if let Err(e) = trace.log_step(context, &context.recipe.steps[index], budget) {
            tracing::warn!(category = "step", path = trace.path(), error = %e, "Failed to write step trace");
        }
    }
}
