use crate::step::ProcessStep;
use serde::{Deserialize, Serialize};

/// Scheduling strategy for a recipe.
///
/// Only `Sequential` has its own semantics. `Parallel` and `Adaptive` are
/// accepted and executed sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    #[default]
    Sequential,
    Parallel,
    Adaptive,
}

/// An ordered list of process steps with a thermal budget limit (°C·s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessRecipe {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flow_type: FlowType,
    pub steps: Vec<ProcessStep>,
    pub thermal_budget_limit: f64,
}

impl ProcessRecipe {
    pub fn new(id: impl Into<String>, name: impl Into<String>, thermal_budget_limit: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            flow_type: FlowType::Sequential,
            steps: Vec::new(),
            thermal_budget_limit,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_flow_type(mut self, flow_type: FlowType) -> Self {
        self.flow_type = flow_type;
        self
    }

    pub fn with_step(mut self, step: ProcessStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Steps can only be appended; declared order is execution order.
    pub fn add_step(&mut self, step: ProcessStep) {
        self.steps.push(step);
    }

    pub fn step(&self, id: &str) -> Option<&ProcessStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut ProcessStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.id.as_str())
    }

    /// Sum of the declared estimated step times.
    pub fn estimated_duration(&self) -> f64 {
        self.steps.iter().map(|s| s.estimated_time).sum()
    }
}
