use crate::physics::{PhysicsEvaluator, PhysicsOutcome};
use fabforge_schemas::optimization::{Evaluation, OptimizationObjective, OptimizationTarget};
use std::{collections::HashMap, time::Instant};

/// `uniformity + yield − cost_weight × cost`.
pub fn default_objectives(cost_weight: f64) -> Vec<OptimizationObjective> {
    vec![
        OptimizationObjective::maximize("uniformity", 1.0),
        OptimizationObjective::maximize("yield", 1.0),
        OptimizationObjective::minimize("cost", cost_weight),
    ]
}

/// Turns candidate parameter sets into scored evaluations via the physics collaborator.
pub struct Evaluator<'a> {
    target: &'a OptimizationTarget,
    objectives: Vec<OptimizationObjective>,
    apply_constraint_penalty: bool,
    count: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        target: &'a OptimizationTarget,
        objectives: Vec<OptimizationObjective>,
        apply_constraint_penalty: bool,
    ) -> Self {
        Self {
            target,
            objectives,
            apply_constraint_penalty,
            count: 0,
        }
    }

    pub fn target(&self) -> &OptimizationTarget {
        self.target
    }

    pub fn objectives(&self) -> &[OptimizationObjective] {
        &self.objectives
    }

    /// Number of physics evaluations performed so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Maps one gene per active parameter onto parameter values.
    ///
    /// Inactive parameters keep their current value.
    pub fn decode_parameters(&self, genes: &[f64]) -> HashMap<String, f64> {
        let mut genes = genes.iter();
        self.target
            .parameters
            .iter()
            .map(|p| {
                let value = if p.active {
                    genes.next().map_or(p.current_value, |g| p.decode(*g))
                } else {
                    p.current_value
                };
                (p.name.clone(), value)
            })
            .collect()
    }

    /// Parameter map with inactive parameters at their current value and
    /// active ones taken from `active_values`.
    pub fn complete_parameters(&self, active_values: &HashMap<String, f64>) -> HashMap<String, f64> {
        self.target
            .parameters
            .iter()
            .map(|p| {
                let value = if p.active {
                    active_values.get(&p.name).copied().unwrap_or(p.current_value)
                } else {
                    p.current_value
                };
                (p.name.clone(), value)
            })
            .collect()
    }

    /// Runs the physics collaborator on a scratch copy of `wafer`.
    ///
    /// Collaborator errors and reported failures yield an unscored, infeasible evaluation.
    pub fn evaluate<P>(&mut self, physics: &mut P, wafer: &P::Wafer, parameters: HashMap<String, f64>) -> Evaluation
    where
        P: PhysicsEvaluator,
        P::Wafer: Clone,
    {
        self.count += 1;
        let mut evaluation = Evaluation::new(parameters);

        let mut inputs = self.target.fixed_parameters.clone();
        inputs.extend(evaluation.parameters.iter().map(|(k, v)| (k.clone(), *v)));

        let mut scratch = wafer.clone();
        let start = Instant::now();
        let outcome = physics.execute(&mut scratch, &self.target.process_type, &inputs);
        evaluation.evaluation_time = start.elapsed().as_secs_f64();

        let results = match outcome {
            Ok(PhysicsOutcome { success: true, results }) => results,
            Ok(PhysicsOutcome { success: false, .. }) => {
                tracing::debug!(category = "optimization", target = %self.target.name, "Physics evaluator reported failure");
                return evaluation;
            }
            Err(e) => {
                tracing::warn!(category = "optimization", target = %self.target.name, error = %e, "Physics evaluator raised an error");
                return evaluation;
            }
        };

        let mut fitness = 0.0;
        for objective in &self.objectives {
            let value = results.get(&objective.name).copied().unwrap_or(0.0);
            evaluation.objectives.insert(objective.name.clone(), value);
            fitness += objective.contribution(value);
        }

        let (feasible, penalty) = self.check_constraints(&evaluation.parameters, &results);
        evaluation.feasible = feasible;
        evaluation.penalty = penalty;
        if self.apply_constraint_penalty {
            fitness -= penalty;
        }
        evaluation.fitness = if fitness.is_nan() { f64::NEG_INFINITY } else { fitness };
        evaluation
    }

    /// Hard-constraint feasibility and the weighted soft-constraint violation.
    ///
    /// A constraint names either a parameter or a physics result; one naming
    /// neither is ignored.
    fn check_constraints(&self, parameters: &HashMap<String, f64>, results: &HashMap<String, f64>) -> (bool, f64) {
        let mut feasible = true;
        let mut penalty = 0.0;
        for constraint in &self.target.constraints {
            let Some(value) = parameters
                .get(&constraint.parameter)
                .or_else(|| results.get(&constraint.parameter))
                .copied()
            else {
                continue;
            };
            let violation = constraint.violation(value);
            if constraint.hard {
                feasible &= violation == 0.0;
            } else {
                penalty += constraint.penalty_weight * violation;
            }
        }
        (feasible, penalty)
    }
}
