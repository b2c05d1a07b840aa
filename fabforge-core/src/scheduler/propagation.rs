//! Cross-process dependencies: results of one step feeding parameters of another.

use fabforge_schemas::recipe::ProcessRecipe;
use std::{fmt, sync::Arc};

pub type TransformFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// How a source result is mapped before it is written into the target.
#[derive(Clone)]
pub enum Transform {
    Identity,
    Scale(f64),
    Offset(f64),
    /// `value * scale + offset`
    Linear { scale: f64, offset: f64 },
    Clamp { min: f64, max: f64 },
    Custom(TransformFn),
}

impl Transform {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Transform::Custom(Arc::new(f))
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Scale(k) => value * k,
            Transform::Offset(d) => value + d,
            Transform::Linear { scale, offset } => value * scale + offset,
            Transform::Clamp { min, max } => value.max(*min).min(*max),
            Transform::Custom(f) => f(value),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::Identity
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => write!(f, "Identity"),
            Transform::Scale(k) => write!(f, "Scale({})", k),
            Transform::Offset(d) => write!(f, "Offset({})", d),
            Transform::Linear { scale, offset } => write!(f, "Linear {{ scale: {}, offset: {} }}", scale, offset),
            Transform::Clamp { min, max } => write!(f, "Clamp {{ min: {}, max: {} }}", min, max),
            Transform::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrossProcessDependency {
    pub source_step: String,
    pub target_step: String,
    /// Key read from the source step's results.
    pub parameter: String,
    /// Key written into the target's parameters; defaults to `parameter`.
    pub target_parameter: Option<String>,
    pub transform: Transform,
    pub critical: bool,
}

impl CrossProcessDependency {
    pub fn new(
        source_step: impl Into<String>,
        target_step: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        Self {
            source_step: source_step.into(),
            target_step: target_step.into(),
            parameter: parameter.into(),
            target_parameter: None,
            transform: Transform::Identity,
            critical: false,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_target_parameter(mut self, name: impl Into<String>) -> Self {
        self.target_parameter = Some(name.into());
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn target_key(&self) -> &str {
        self.target_parameter.as_deref().unwrap_or(&self.parameter)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropagatedValue {
    pub source_step: String,
    pub target_step: String,
    pub parameter: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationReport {
    pub applied: Vec<PropagatedValue>,
    /// Unresolvable critical dependencies.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyPropagator {
    dependencies: Vec<CrossProcessDependency>,
}

impl DependencyPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, dependency: CrossProcessDependency) {
        self.dependencies.push(dependency);
    }

    pub fn dependencies(&self) -> &[CrossProcessDependency] {
        &self.dependencies
    }

    /// Pushes results of `completed_step` into every registered downstream step.
    pub fn propagate(&self, recipe: &mut ProcessRecipe, completed_step: &str) -> PropagationReport {
        let mut report = PropagationReport::default();

        for dependency in self.dependencies.iter().filter(|d| d.source_step == completed_step) {
            let source_value = recipe
                .step(completed_step)
                .and_then(|s| s.results.get(&dependency.parameter))
                .copied();

            let Some(raw) = source_value else {
                report_unresolved(
                    &mut report,
                    dependency,
                    format!(
                        "Step '{}' produced no '{}' result for dependent step '{}'",
                        completed_step, dependency.parameter, dependency.target_step
                    ),
                );
                continue;
            };

            let Some(target) = recipe.step_mut(&dependency.target_step) else {
                report_unresolved(
                    &mut report,
                    dependency,
                    format!(
                        "Dependent step '{}' of '{}' is not part of recipe '{}'",
                        dependency.target_step, completed_step, recipe.id
                    ),
                );
                continue;
            };

            let value = dependency.transform.apply(raw);
            target.parameters.insert(dependency.target_key().to_string(), value);

            tracing::debug!(
                category = "dependency",
                source = %completed_step,
                target = %dependency.target_step,
                parameter = %dependency.target_key(),
                value,
                "Propagated process result"
            );
            report.applied.push(PropagatedValue {
                source_step: completed_step.to_string(),
                target_step: dependency.target_step.clone(),
                parameter: dependency.target_key().to_string(),
                value,
            });
        }

        report
    }
}

fn report_unresolved(report: &mut PropagationReport, dependency: &CrossProcessDependency, message: String) {
    if dependency.critical {
        tracing::warn!(category = "dependency", "{}", message);
        report.warnings.push(message);
    } else {
        tracing::debug!(category = "dependency", "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabforge_schemas::step::ProcessStep;

    fn recipe() -> ProcessRecipe {
        let mut oxide = ProcessStep::new("oxide", "oxidation", 60.0);
        oxide.results.insert("thickness".into(), 25.0);
        ProcessRecipe::new("r", "r", 1.0e6)
            .with_step(oxide)
            .with_step(ProcessStep::new("etch", "etching", 30.0).with_parameter("thickness", 1.0))
    }

    #[test]
    fn copies_and_overwrites_target_parameter() {
        let mut propagator = DependencyPropagator::new();
        propagator.register(CrossProcessDependency::new("oxide", "etch", "thickness"));
        let mut r = recipe();

        let report = propagator.propagate(&mut r, "oxide");
        assert_eq!(report.applied.len(), 1);
        assert_eq!(r.step("etch").unwrap().parameters["thickness"], 25.0);
    }

    #[test]
    fn applies_transforms_and_renames() {
        let mut propagator = DependencyPropagator::new();
        propagator.register(
            CrossProcessDependency::new("oxide", "etch", "thickness")
                .with_transform(Transform::Linear { scale: 2.0, offset: 1.0 })
                .with_target_parameter("etch_depth"),
        );
        propagator.register(
            CrossProcessDependency::new("oxide", "etch", "thickness")
                .with_transform(Transform::custom(|t| t.sqrt()))
                .with_target_parameter("root"),
        );
        let mut r = recipe();
        propagator.propagate(&mut r, "oxide");

        let etch = r.step("etch").unwrap();
        assert_eq!(etch.parameters["etch_depth"], 51.0);
        assert_eq!(etch.parameters["root"], 5.0);
        assert_eq!(etch.parameters["thickness"], 1.0);
    }

    #[test]
    fn only_matching_sources_fire() {
        let mut propagator = DependencyPropagator::new();
        propagator.register(CrossProcessDependency::new("etch", "oxide", "depth"));
        let mut r = recipe();
        let report = propagator.propagate(&mut r, "oxide");
        assert!(report.applied.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_values_warn_only_when_critical() {
        let mut propagator = DependencyPropagator::new();
        propagator.register(CrossProcessDependency::new("oxide", "etch", "stress"));
        propagator.register(CrossProcessDependency::new("oxide", "metal", "thickness").critical());
        let mut r = recipe();

        let report = propagator.propagate(&mut r, "oxide");
        assert!(report.applied.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("metal"));
    }

    #[test]
    fn clamp_transform_bounds_value() {
        let t = Transform::Clamp { min: 0.0, max: 10.0 };
        assert_eq!(t.apply(-3.0), 0.0);
        assert_eq!(t.apply(30.0), 10.0);
        assert_eq!(format!("{:?}", Transform::custom(|x| x)), "Custom(..)");
    }
}
