use fabforge_schemas::optimization::{
    Evaluation, OptimizationAlgorithm, OptimizationResults, OptimizationStatistics, OptimizationTarget, StopReason,
};

/// Share of a parameter's span within which a value counts as pinned to a bound.
const BOUND_TOLERANCE: f64 = 0.01;

pub fn compute_statistics(evaluations: &[Evaluation]) -> OptimizationStatistics {
    let scored: Vec<f64> = evaluations
        .iter()
        .filter(|e| e.is_scored())
        .map(|e| e.fitness)
        .collect();

    let mut stats = OptimizationStatistics {
        evaluation_count: evaluations.len(),
        feasible_count: evaluations.iter().filter(|e| e.feasible).count(),
        scored_count: scored.len(),
        total_evaluation_time: evaluations.iter().map(|e| e.evaluation_time).sum(),
        ..OptimizationStatistics::default()
    };
    if scored.is_empty() {
        return stats;
    }

    let n = scored.len() as f64;
    stats.min_fitness = scored.iter().copied().fold(f64::INFINITY, f64::min);
    stats.max_fitness = scored.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    stats.mean_fitness = scored.iter().sum::<f64>() / n;
    let variance = scored
        .iter()
        .map(|f| (f - stats.mean_fitness).powi(2))
        .sum::<f64>()
        / n;
    stats.std_dev_fitness = variance.sqrt();
    stats
}

/// Highest-fitness scored evaluation; the earliest wins ties.
pub fn best_evaluation(evaluations: &[Evaluation]) -> Option<&Evaluation> {
    evaluations
        .iter()
        .filter(|e| e.is_scored())
        .fold(None, |best: Option<&Evaluation>, e| match best {
            Some(b) if b.fitness >= e.fitness => Some(b),
            _ => Some(e),
        })
}

pub fn generate_recommendations(target: &OptimizationTarget, results: &OptimizationResults) -> Vec<String> {
    let mut recommendations = Vec::new();

    if results.algorithm != results.requested_algorithm {
        recommendations.push(format!(
            "{} is not implemented; {} was used instead",
            results.requested_algorithm, results.algorithm
        ));
    }

    let Some(best) = &results.best_solution else {
        recommendations.push(format!(
            "No candidate produced a usable fitness; check the physics evaluator for process type '{}'",
            target.process_type
        ));
        return recommendations;
    };

    let mut values: Vec<(&String, &f64)> = best.parameters.iter().collect();
    values.sort_by(|a, b| a.0.cmp(b.0));
    let listed = values
        .iter()
        .map(|(name, value)| format!("{}={:.4}", name, value))
        .collect::<Vec<_>>()
        .join(", ");
    recommendations.push(format!("Best fitness {:.4} at {}", best.fitness, listed));

    if !best.feasible {
        recommendations.push("Best solution violates hard constraints; tighten parameter ranges to the constraint limits".to_string());
    }
    if best.penalty > 0.0 {
        recommendations.push(format!("Best solution carries a soft-constraint penalty of {:.4}", best.penalty));
    }

    for parameter in target.active_parameters() {
        let Some(value) = best.parameters.get(&parameter.name) else {
            continue;
        };
        if parameter.span() <= 0.0 {
            continue;
        }
        let tolerance = parameter.span() * BOUND_TOLERANCE;
        if *value - parameter.min_value <= tolerance {
            recommendations.push(format!(
                "Parameter '{}' settled at its lower bound {}; consider extending the range below it",
                parameter.name, parameter.min_value
            ));
        } else if parameter.max_value - *value <= tolerance {
            recommendations.push(format!(
                "Parameter '{}' settled at its upper bound {}; consider extending the range above it",
                parameter.name, parameter.max_value
            ));
        }
    }

    if results.algorithm == OptimizationAlgorithm::GeneticAlgorithm && results.stop_reason == StopReason::MaxGenerations {
        recommendations.push(format!(
            "Search stopped after {} generations without converging; consider raising max_generations",
            results.generations
        ));
    }

    let stats = &results.statistics;
    if stats.evaluation_count > 0 && stats.feasible_count * 2 < stats.evaluation_count {
        recommendations.push(format!(
            "Only {} of {} evaluations satisfied the hard constraints",
            stats.feasible_count, stats.evaluation_count
        ));
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabforge_schemas::optimization::OptimizationParameter;
    use std::collections::HashMap;

    fn evaluation(x: f64, fitness: f64, feasible: bool) -> Evaluation {
        let mut e = Evaluation::new(HashMap::from([("x".to_string(), x)]));
        e.fitness = fitness;
        e.feasible = feasible;
        e.evaluation_time = 0.5;
        e
    }

    #[test]
    fn statistics_skip_unscored_fitness() {
        let evaluations = vec![
            evaluation(0.0, 1.0, true),
            evaluation(0.5, 3.0, false),
            evaluation(1.0, f64::NEG_INFINITY, false),
        ];
        let stats = compute_statistics(&evaluations);
        assert_eq!(stats.evaluation_count, 3);
        assert_eq!(stats.scored_count, 2);
        assert_eq!(stats.feasible_count, 1);
        assert_eq!(stats.min_fitness, 1.0);
        assert_eq!(stats.max_fitness, 3.0);
        assert_eq!(stats.mean_fitness, 2.0);
        assert_eq!(stats.std_dev_fitness, 1.0);
        assert_eq!(stats.total_evaluation_time, 1.5);
    }

    #[test]
    fn best_is_first_of_equal_maxima() {
        let evaluations = vec![evaluation(0.0, 2.0, true), evaluation(1.0, 2.0, true)];
        assert_eq!(best_evaluation(&evaluations).unwrap().parameters["x"], 0.0);
        assert!(best_evaluation(&[evaluation(0.0, f64::NEG_INFINITY, false)]).is_none());
    }

    #[test]
    fn recommends_widening_pinned_bounds_and_flags_fallback() {
        let target = OptimizationTarget::new("t", "anneal")
            .with_parameter(OptimizationParameter::continuous("x", 0.0, 1.0, 0.5));
        let evaluations = vec![evaluation(1.0, 2.0, true)];
        let results = OptimizationResults {
            target: "t".into(),
            algorithm: OptimizationAlgorithm::GeneticAlgorithm,
            requested_algorithm: OptimizationAlgorithm::ParticleSwarm,
            best_solution: best_evaluation(&evaluations).cloned(),
            statistics: compute_statistics(&evaluations),
            evaluations,
            has_converged: true,
            stop_reason: StopReason::Stagnation,
            total_evaluations: 1,
            generations: 21,
            history: Vec::new(),
            recommendations: Vec::new(),
        };

        let recommendations = generate_recommendations(&target, &results);
        assert!(recommendations[0].starts_with("particle_swarm is not implemented"));
        assert!(recommendations.iter().any(|r| r.contains("upper bound")));
        assert!(!recommendations.iter().any(|r| r.contains("max_generations")));
    }
}
