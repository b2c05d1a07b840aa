use super::{executor::RecipeExecutor, propagation::CrossProcessDependency};
use crate::{
    config::FabforgeConfig,
    error::{FabforgeError, FabforgeResult},
    logger::StepTraceLogger,
    physics::PhysicsEvaluator,
    services::Services,
};
use fabforge_schemas::recipe::ProcessRecipe;

/// A fluent builder for constructing a `RecipeExecutor`.
///
/// Recipes handed to the builder are validated in `build`, so a successfully
/// built executor only ever holds well-formed recipes.
pub struct RecipeExecutorBuilder<P: PhysicsEvaluator> {
    services: Option<Services>,
    physics: Option<P>,
    recipes: Vec<ProcessRecipe>,
    dependencies: Vec<CrossProcessDependency>,
    trace_path: Option<String>,
}

impl<P: PhysicsEvaluator> Default for RecipeExecutorBuilder<P> {
    fn default() -> Self {
        Self {
            services: None,
            physics: None,
            recipes: Vec::new(),
            dependencies: Vec::new(),
            trace_path: None,
        }
    }
}

impl<P: PhysicsEvaluator> RecipeExecutorBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = Some(services);
        self
    }

    /// Shorthand for `with_services(Services::new(config))`.
    pub fn with_config(self, config: FabforgeConfig) -> Self {
        self.with_services(Services::new(config))
    }

    /// Sets the physics collaborator every step is executed against.
    pub fn with_physics(mut self, physics: P) -> Self {
        self.physics = Some(physics);
        self
    }

    pub fn with_recipe(mut self, recipe: ProcessRecipe) -> Self {
        self.recipes.push(recipe);
        self
    }

    pub fn with_dependency(mut self, dependency: CrossProcessDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Writes one CSV row per terminal step transition to `path`.
    pub fn with_step_trace_to_file(mut self, path: &str) -> Self {
        self.trace_path = Some(path.to_string());
        self
    }

    /// Consumes the builder and returns a configured `RecipeExecutor`.
    ///
    /// # Errors
    ///
    /// Fails when no physics evaluator was provided, when a recipe does not
    /// validate, or when the trace file cannot be created.
    pub fn build(self) -> FabforgeResult<RecipeExecutor<P>> {
        let physics = self
            .physics
            .ok_or_else(|| FabforgeError::ConfigError("no physics evaluator provided".into()))?;
        let services = self.services.unwrap_or_default();
        services.config().validate()?;

        let mut executor = RecipeExecutor::new(services, physics);
        for recipe in self.recipes {
            executor.register_recipe(recipe)?;
        }
        for dependency in self.dependencies {
            executor.add_dependency(dependency);
        }
        if let Some(path) = self.trace_path {
            executor.trace = Some(StepTraceLogger::new(&path)?);
        }
        Ok(executor)
    }
}
