use super::{
    analysis,
    evaluator::{default_objectives, Evaluator},
    genetic, sweep, SearchOutcome,
};
use crate::{
    error::{FabforgeError, FabforgeResult},
    physics::PhysicsEvaluator,
    services::Services,
};
use fabforge_schemas::optimization::{
    OptimizationAlgorithm, OptimizationObjective, OptimizationResults, OptimizationTarget,
};

/// Runs parameter searches for one process type against the physics collaborator.
///
/// Every candidate is evaluated on a fresh clone of the baseline wafer, so
/// the caller's wafer is never modified.
pub struct OptimizationController<P: PhysicsEvaluator> {
    services: Services,
    physics: P,
}

impl<P> OptimizationController<P>
where
    P: PhysicsEvaluator,
    P::Wafer: Clone,
{
    pub fn new(services: Services, physics: P) -> Self {
        Self { services, physics }
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

    pub fn validate_target(target: &OptimizationTarget) -> FabforgeResult<()> {
        if target.active_count() == 0 {
            return Err(FabforgeError::NoActiveParameters(target.name.clone()));
        }
        if let Some(p) = target.active_parameters().find(|p| !p.has_valid_range()) {
            return Err(FabforgeError::InvalidParameterRange {
                name: p.name.clone(),
                min: p.min_value,
                max: p.max_value,
            });
        }
        Ok(())
    }

    /// Searches `target`'s active parameters with `algorithm`.
    ///
    /// An empty `objectives` list means `uniformity + yield − cost_weight × cost`.
    /// Particle swarm and simulated annealing run the genetic algorithm.
    pub fn optimize_process(
        &mut self,
        target: &OptimizationTarget,
        wafer: &P::Wafer,
        algorithm: OptimizationAlgorithm,
        objectives: &[OptimizationObjective],
    ) -> FabforgeResult<OptimizationResults> {
        Self::validate_target(target)?;

        let config = &self.services.config().optimization;
        let objectives = if objectives.is_empty() {
            default_objectives(config.cost_weight)
        } else {
            objectives.to_vec()
        };

        let effective = match algorithm {
            OptimizationAlgorithm::ParticleSwarm | OptimizationAlgorithm::SimulatedAnnealing => {
                tracing::warn!(
                    category = "optimization",
                    requested = %algorithm,
                    "Algorithm not implemented; falling back to the genetic algorithm"
                );
                OptimizationAlgorithm::GeneticAlgorithm
            }
            other => other,
        };

        tracing::info!(
            category = "optimization",
            target = %target.name,
            process_type = %target.process_type,
            algorithm = %effective,
            "Optimization started"
        );

        let mut rng = self.services.rng();
        let mut evaluator = Evaluator::new(target, objectives, config.apply_constraint_penalty);
        let outcome: SearchOutcome = match effective {
            OptimizationAlgorithm::ParameterSweep => {
                sweep::parameter_sweep(&mut evaluator, &mut self.physics, wafer, config, &mut rng)?
            }
            _ => genetic::genetic_algorithm(&mut evaluator, &mut self.physics, wafer, config, &mut rng),
        };

        let best_solution = analysis::best_evaluation(&outcome.evaluations).cloned();
        let statistics = analysis::compute_statistics(&outcome.evaluations);
        let mut results = OptimizationResults {
            target: target.name.clone(),
            algorithm: effective,
            requested_algorithm: algorithm,
            best_solution,
            has_converged: outcome.has_converged,
            stop_reason: outcome.stop_reason,
            total_evaluations: evaluator.count(),
            generations: outcome.generations,
            history: outcome.history,
            recommendations: Vec::new(),
            statistics,
            evaluations: outcome.evaluations,
        };
        results.recommendations = analysis::generate_recommendations(target, &results);

        tracing::info!(
            category = "optimization",
            target = %target.name,
            evaluations = results.total_evaluations,
            converged = results.has_converged,
            best = ?results.best_solution.as_ref().map(|b| b.fitness),
            "Optimization finished"
        );
        Ok(results)
    }
}
