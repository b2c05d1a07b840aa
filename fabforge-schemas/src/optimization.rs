use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    #[default]
    Continuous,
    Discrete,
    Categorical,
    Boolean,
    Integer,
    Enumerated,
}

/// A tunable process parameter and its search range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizationParameter {
    pub name: String,
    #[serde(default)]
    pub param_type: ParameterType,
    pub min_value: f64,
    pub max_value: f64,
    pub current_value: f64,
    /// Grid spacing for sweeps and for snapping `Discrete` values.
    #[serde(default)]
    pub step_size: f64,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub units: String,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

impl OptimizationParameter {
    pub fn continuous(name: impl Into<String>, min_value: f64, max_value: f64, step_size: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Continuous,
            min_value,
            max_value,
            current_value: min_value,
            step_size,
            active: true,
            weight: 1.0,
            units: String::new(),
        }
    }

    pub fn with_type(mut self, param_type: ParameterType) -> Self {
        self.param_type = param_type;
        self
    }

    pub fn with_current(mut self, value: f64) -> Self {
        self.current_value = value;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn span(&self) -> f64 {
        self.max_value - self.min_value
    }

    pub fn has_valid_range(&self) -> bool {
        self.min_value.is_finite() && self.max_value.is_finite() && self.min_value <= self.max_value
    }

    /// Maps a normalized gene in [0, 1] onto `[min_value, max_value]`.
    ///
    /// The mapping is linear; non-continuous types are then snapped to their
    /// admissible values.
    pub fn decode(&self, gene: f64) -> f64 {
        let gene = gene.clamp(0.0, 1.0);
        self.quantize(self.min_value + gene * self.span())
    }

    /// Inverse of [`decode`](Self::decode) for continuous parameters.
    pub fn encode(&self, value: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min_value) / span).clamp(0.0, 1.0)
    }

    /// Snaps a raw value in range onto the admissible set for this type.
    pub fn quantize(&self, value: f64) -> f64 {
        if !self.has_valid_range() {
            return value;
        }
        let value = value.clamp(self.min_value, self.max_value);
        match self.param_type {
            ParameterType::Continuous => value,
            ParameterType::Discrete => {
                if self.step_size > 0.0 {
                    let k = ((value - self.min_value) / self.step_size).round();
                    (self.min_value + k * self.step_size).clamp(self.min_value, self.max_value)
                } else {
                    value
                }
            }
            ParameterType::Boolean => {
                if value >= self.min_value + self.span() / 2.0 {
                    self.max_value
                } else {
                    self.min_value
                }
            }
            ParameterType::Integer | ParameterType::Categorical | ParameterType::Enumerated => {
                let (lo, hi) = (self.min_value.ceil(), self.max_value.floor());
                if lo > hi {
                    value
                } else {
                    value.round().clamp(lo, hi)
                }
            }
        }
    }
}

/// A range limit on one parameter.
///
/// Hard constraints decide feasibility; soft constraints contribute a penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizationConstraint {
    pub parameter: String,
    pub min_limit: f64,
    pub max_limit: f64,
    #[serde(default = "default_true")]
    pub hard: bool,
    #[serde(default = "default_weight")]
    pub penalty_weight: f64,
}

impl OptimizationConstraint {
    pub fn hard(parameter: impl Into<String>, min_limit: f64, max_limit: f64) -> Self {
        Self {
            parameter: parameter.into(),
            min_limit,
            max_limit,
            hard: true,
            penalty_weight: 1.0,
        }
    }

    pub fn soft(parameter: impl Into<String>, min_limit: f64, max_limit: f64, penalty_weight: f64) -> Self {
        Self {
            parameter: parameter.into(),
            min_limit,
            max_limit,
            hard: false,
            penalty_weight,
        }
    }

    /// Distance outside `[min_limit, max_limit]`, zero when satisfied.
    pub fn violation(&self, value: f64) -> f64 {
        if value < self.min_limit {
            self.min_limit - value
        } else if value > self.max_limit {
            value - self.max_limit
        } else {
            0.0
        }
    }

    pub fn is_satisfied(&self, value: f64) -> bool {
        self.violation(value) == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveGoal {
    Maximize,
    Minimize,
}

/// A named physics result contributing `±weight × value` to fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizationObjective {
    pub name: String,
    pub goal: ObjectiveGoal,
    pub weight: f64,
}

impl OptimizationObjective {
    pub fn maximize(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            goal: ObjectiveGoal::Maximize,
            weight,
        }
    }

    pub fn minimize(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            goal: ObjectiveGoal::Minimize,
            weight,
        }
    }

    /// Signed contribution of `value` to the fitness score.
    pub fn contribution(&self, value: f64) -> f64 {
        match self.goal {
            ObjectiveGoal::Maximize => self.weight * value,
            ObjectiveGoal::Minimize => -self.weight * value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationAlgorithm {
    ParameterSweep,
    GeneticAlgorithm,
    ParticleSwarm,
    SimulatedAnnealing,
}

impl std::fmt::Display for OptimizationAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OptimizationAlgorithm::ParameterSweep => "parameter_sweep",
            OptimizationAlgorithm::GeneticAlgorithm => "genetic_algorithm",
            OptimizationAlgorithm::ParticleSwarm => "particle_swarm",
            OptimizationAlgorithm::SimulatedAnnealing => "simulated_annealing",
        };
        f.write_str(label)
    }
}

/// What to optimize: one process type, its tunable parameters, and limits.
///
/// `fixed_parameters` are passed to the physics collaborator unchanged
/// alongside the decoded candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizationTarget {
    pub name: String,
    pub process_type: String,
    pub parameters: Vec<OptimizationParameter>,
    #[serde(default)]
    pub constraints: Vec<OptimizationConstraint>,
    #[serde(default)]
    pub fixed_parameters: HashMap<String, f64>,
}

impl OptimizationTarget {
    pub fn new(name: impl Into<String>, process_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            process_type: process_type.into(),
            parameters: Vec::new(),
            constraints: Vec::new(),
            fixed_parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: OptimizationParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_constraint(mut self, constraint: OptimizationConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_fixed_parameter(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fixed_parameters.insert(key.into(), value);
        self
    }

    pub fn active_parameters(&self) -> impl Iterator<Item = &OptimizationParameter> {
        self.parameters.iter().filter(|p| p.active)
    }

    pub fn active_count(&self) -> usize {
        self.active_parameters().count()
    }
}

/// One scored candidate parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Evaluation {
    pub parameters: HashMap<String, f64>,
    pub objectives: HashMap<String, f64>,
    /// `f64::NEG_INFINITY` until the evaluation has run.
    pub fitness: f64,
    pub feasible: bool,
    /// Weighted soft-constraint violation.
    #[serde(default)]
    pub penalty: f64,
    /// Wall-clock cost of the evaluation in seconds.
    pub evaluation_time: f64,
}

impl Evaluation {
    pub fn new(parameters: HashMap<String, f64>) -> Self {
        Self {
            parameters,
            objectives: HashMap::new(),
            fitness: f64::NEG_INFINITY,
            feasible: false,
            penalty: 0.0,
            evaluation_time: 0.0,
        }
    }

    pub fn is_scored(&self) -> bool {
        self.fitness.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The sweep visited every planned combination.
    Exhausted,
    MaxGenerations,
    Stagnation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub average_fitness: f64,
    pub evaluations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizationStatistics {
    pub evaluation_count: usize,
    pub feasible_count: usize,
    pub scored_count: usize,
    pub min_fitness: f64,
    pub max_fitness: f64,
    pub mean_fitness: f64,
    pub std_dev_fitness: f64,
    pub total_evaluation_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizationResults {
    pub target: String,
    /// The algorithm that actually ran, after any fallback.
    pub algorithm: OptimizationAlgorithm,
    pub requested_algorithm: OptimizationAlgorithm,
    pub evaluations: Vec<Evaluation>,
    pub best_solution: Option<Evaluation>,
    pub has_converged: bool,
    pub stop_reason: StopReason,
    pub total_evaluations: usize,
    pub generations: usize,
    pub history: Vec<GenerationStats>,
    pub recommendations: Vec<String>,
    pub statistics: OptimizationStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_decode_is_linear() {
        let p = OptimizationParameter::continuous("temperature", 900.0, 1100.0, 50.0);
        assert_eq!(p.decode(0.0), 900.0);
        assert_eq!(p.decode(0.5), 1000.0);
        assert_eq!(p.decode(1.0), 1100.0);
        assert_eq!(p.encode(1000.0), 0.5);
    }

    #[test]
    fn non_continuous_types_snap() {
        let discrete = OptimizationParameter::continuous("dose", 0.0, 10.0, 2.5).with_type(ParameterType::Discrete);
        assert_eq!(discrete.decode(0.3), 2.5);

        let integer = OptimizationParameter::continuous("passes", 1.0, 5.0, 1.0).with_type(ParameterType::Integer);
        assert_eq!(integer.decode(0.49), 3.0);

        let flag = OptimizationParameter::continuous("ramp", 0.0, 1.0, 1.0).with_type(ParameterType::Boolean);
        assert_eq!(flag.decode(0.2), 0.0);
        assert_eq!(flag.decode(0.7), 1.0);
    }

    #[test]
    fn constraint_violation_distance() {
        let c = OptimizationConstraint::hard("temperature", 950.0, 1050.0);
        assert_eq!(c.violation(1000.0), 0.0);
        assert_eq!(c.violation(900.0), 50.0);
        assert_eq!(c.violation(1075.0), 25.0);
        assert!(!c.is_satisfied(1075.0));
    }

    #[test]
    fn new_evaluation_is_unscored() {
        let e = Evaluation::new(HashMap::new());
        assert_eq!(e.fitness, f64::NEG_INFINITY);
        assert!(!e.is_scored());
    }

    #[test]
    fn objective_contribution_sign() {
        assert_eq!(OptimizationObjective::maximize("yield", 1.0).contribution(0.9), 0.9);
        assert_eq!(OptimizationObjective::minimize("cost", 0.1).contribution(10.0), -1.0);
    }
}
