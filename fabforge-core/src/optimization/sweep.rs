use super::{evaluator::Evaluator, SearchOutcome};
use crate::{
    config::OptimizationConfig,
    error::{FabforgeError, FabforgeResult},
    physics::PhysicsEvaluator,
};
use fabforge_schemas::optimization::{OptimizationParameter, StopReason};
use rand::Rng;
use std::collections::HashMap;

const GRID_EPSILON: f64 = 1e-9;

/// Grid points for one parameter, from `min_value` upwards.
///
/// A non-positive `step_size` splits the range into `default_divisions`
/// intervals instead. Quantized duplicates are dropped. A grid of more than
/// `max_points` points is refused before anything is allocated.
pub fn grid_values(
    parameter: &OptimizationParameter,
    default_divisions: usize,
    max_points: usize,
) -> FabforgeResult<Vec<f64>> {
    let span = parameter.span();
    if span <= 0.0 {
        return Ok(vec![parameter.quantize(parameter.min_value)]);
    }

    let step = if parameter.step_size > 0.0 {
        parameter.step_size
    } else {
        span / default_divisions.max(1) as f64
    };
    let intervals = (span / step + GRID_EPSILON).floor();
    // NaN and infinity fail the comparison too.
    if !(intervals + 1.0 <= max_points as f64) {
        return Err(FabforgeError::SweepTooLarge {
            scope: parameter.name.clone(),
            points: intervals + 1.0,
            limit: max_points,
        });
    }

    let mut values: Vec<f64> = Vec::new();
    for k in 0..=intervals as usize {
        let value = parameter.quantize((parameter.min_value + k as f64 * step).min(parameter.max_value));
        if values.last().map_or(true, |last| (last - value).abs() > GRID_EPSILON) {
            values.push(value);
        }
    }
    Ok(values)
}

/// Exhaustive grid over one or two active parameters, bounded random
/// sampling over three or more.
///
/// Grids larger than `max_sweep_points` candidates are rejected before any
/// physics call.
pub fn parameter_sweep<P, R>(
    evaluator: &mut Evaluator<'_>,
    physics: &mut P,
    wafer: &P::Wafer,
    config: &OptimizationConfig,
    rng: &mut R,
) -> FabforgeResult<SearchOutcome>
where
    P: PhysicsEvaluator,
    P::Wafer: Clone,
    R: Rng,
{
    let active: Vec<OptimizationParameter> = evaluator.target().active_parameters().cloned().collect();

    let candidates: Vec<HashMap<String, f64>> = match active.as_slice() {
        [single] => grid_values(single, config.default_sweep_divisions, config.max_sweep_points)?
            .into_iter()
            .map(|v| HashMap::from([(single.name.clone(), v)]))
            .collect(),
        [first, second] => {
            let limit = config.max_sweep_points;
            let first_values = grid_values(first, config.default_sweep_divisions, limit)?;
            let second_values = grid_values(second, config.default_sweep_divisions, limit)?;
            let combined = first_values.len().saturating_mul(second_values.len());
            if combined > limit {
                return Err(FabforgeError::SweepTooLarge {
                    scope: format!("{} x {}", first.name, second.name),
                    points: combined as f64,
                    limit,
                });
            }
            first_values
                .iter()
                .flat_map(|a| {
                    second_values
                        .iter()
                        .map(move |b| HashMap::from([(first.name.clone(), *a), (second.name.clone(), *b)]))
                })
                .collect()
        }
        _ => (0..config.random_sweep_samples)
            .map(|_| {
                active
                    .iter()
                    .map(|p| (p.name.clone(), p.decode(rng.gen::<f64>())))
                    .collect()
            })
            .collect(),
    };

    tracing::info!(
        category = "optimization",
        target = %evaluator.target().name,
        active = active.len(),
        candidates = candidates.len(),
        "Parameter sweep started"
    );

    let evaluations = candidates
        .iter()
        .map(|values| {
            let parameters = evaluator.complete_parameters(values);
            evaluator.evaluate(physics, wafer, parameters)
        })
        .collect();

    Ok(SearchOutcome {
        evaluations,
        has_converged: true,
        stop_reason: StopReason::Exhausted,
        generations: 0,
        history: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabforge_schemas::optimization::ParameterType;

    #[test]
    fn half_step_over_unit_range_gives_three_points() {
        let p = OptimizationParameter::continuous("x", 0.0, 1.0, 0.5);
        assert_eq!(grid_values(&p, 10, 100).unwrap(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn missing_step_uses_default_divisions() {
        let p = OptimizationParameter::continuous("x", 0.0, 1.0, 0.0);
        assert_eq!(grid_values(&p, 4, 100).unwrap(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn degenerate_range_is_single_point() {
        let p = OptimizationParameter::continuous("x", 3.0, 3.0, 1.0);
        assert_eq!(grid_values(&p, 10, 100).unwrap(), vec![3.0]);
    }

    #[test]
    fn integer_grid_drops_duplicates() {
        let p = OptimizationParameter::continuous("passes", 1.0, 3.0, 0.5).with_type(ParameterType::Integer);
        let values = grid_values(&p, 10, 100).unwrap();
        assert_eq!(values.first(), Some(&1.0));
        assert_eq!(values.last(), Some(&3.0));
        assert!(values.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn oversized_grid_is_refused() {
        let p = OptimizationParameter::continuous("x", 0.0, 1.0e6, 1.0e-12);
        let err = grid_values(&p, 10, 10_000).unwrap_err();
        assert_eq!(err.code(), "SWEEP_TOO_LARGE");

        let tiny = OptimizationParameter::continuous("x", 0.0, 1.0e300, 1.0e-300);
        assert!(grid_values(&tiny, 10, usize::MAX).is_err());
    }

    #[test]
    fn grid_at_the_limit_is_accepted() {
        let p = OptimizationParameter::continuous("x", 0.0, 1.0, 0.25);
        assert_eq!(grid_values(&p, 10, 5).unwrap().len(), 5);
        assert!(grid_values(&p, 10, 4).is_err());
    }
}
