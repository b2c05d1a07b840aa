//! Genetic algorithm over normalized genes, one per active parameter.

use super::{evaluator::Evaluator, SearchOutcome};
use crate::{config::OptimizationConfig, physics::PhysicsEvaluator};
use fabforge_schemas::optimization::{GenerationStats, StopReason};
use rand::Rng;
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq)]
pub struct GaIndividual {
    /// Each gene lies in [0, 1].
    pub genes: Vec<f64>,
    pub fitness: f64,
    pub evaluated: bool,
}

impl GaIndividual {
    pub fn new(genes: Vec<f64>) -> Self {
        Self {
            genes,
            fitness: f64::NEG_INFINITY,
            evaluated: false,
        }
    }

    pub fn random<R: Rng>(gene_count: usize, rng: &mut R) -> Self {
        Self::new((0..gene_count).map(|_| rng.gen::<f64>()).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaPopulation {
    pub individuals: Vec<GaIndividual>,
    pub generation: usize,
    pub best_fitness: f64,
    pub average_fitness: f64,
}

impl GaPopulation {
    pub fn random<R: Rng>(size: usize, gene_count: usize, rng: &mut R) -> Self {
        Self {
            individuals: (0..size).map(|_| GaIndividual::random(gene_count, rng)).collect(),
            generation: 0,
            best_fitness: f64::NEG_INFINITY,
            average_fitness: f64::NEG_INFINITY,
        }
    }

    /// Refreshes best and average fitness; unscored individuals are left
    /// out of the average.
    pub fn update_statistics(&mut self) {
        self.best_fitness = self
            .individuals
            .iter()
            .map(|i| i.fitness)
            .fold(f64::NEG_INFINITY, f64::max);

        let finite: Vec<f64> = self
            .individuals
            .iter()
            .map(|i| i.fitness)
            .filter(|f| f.is_finite())
            .collect();
        self.average_fitness = if finite.is_empty() {
            f64::NEG_INFINITY
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };
    }
}

/// Standard normal sample (Box-Muller).
pub fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Fittest of `size` uniform draws, with replacement.
pub fn tournament_select<'a, R: Rng>(individuals: &'a [GaIndividual], size: usize, rng: &mut R) -> &'a GaIndividual {
    let len = individuals.len();
    let mut best = &individuals[rng.gen_range(0..len)];
    for _ in 1..size.max(1) {
        let candidate = &individuals[rng.gen_range(0..len)];
        if candidate.fitness > best.fitness {
            best = candidate;
        }
    }
    best
}

/// The mating pool: `population_size` tournament winners, or the population
/// itself when tournament selection is disabled.
pub fn select<R: Rng>(individuals: &[GaIndividual], config: &OptimizationConfig, rng: &mut R) -> Vec<GaIndividual> {
    if !config.use_tournament_selection || individuals.is_empty() {
        return individuals.to_vec();
    }
    (0..config.population_size)
        .map(|_| tournament_select(individuals, config.tournament_size, rng).clone())
        .collect()
}

/// Child taking genes `[0, point)` from `a` and `[point, len)` from `b`.
pub fn single_point_crossover<R: Rng>(a: &GaIndividual, b: &GaIndividual, rng: &mut R) -> GaIndividual {
    let len = a.genes.len();
    let point = if len == 0 { 0 } else { rng.gen_range(0..len) };
    let genes = a.genes[..point]
        .iter()
        .chain(b.genes[point..].iter())
        .copied()
        .collect();
    GaIndividual::new(genes)
}

/// One unevaluated offspring per slot of the mating pool. Slots that skip
/// crossover copy the parent's genes only.
pub fn crossover<R: Rng>(pool: &[GaIndividual], crossover_rate: f64, rng: &mut R) -> Vec<GaIndividual> {
    let len = pool.len();
    (0..len)
        .map(|slot| {
            if rng.gen::<f64>() < crossover_rate {
                let a = &pool[rng.gen_range(0..len)];
                let b = &pool[rng.gen_range(0..len)];
                single_point_crossover(a, b, rng)
            } else {
                GaIndividual::new(pool[slot].genes.clone())
            }
        })
        .collect()
}

/// Per-gene Gaussian perturbation, clamped to [0, 1]. Returns whether any
/// gene moved; a mutated individual must be re-evaluated.
pub fn mutate<R: Rng>(individual: &mut GaIndividual, mutation_rate: f64, sigma: f64, rng: &mut R) -> bool {
    let mut mutated = false;
    for gene in individual.genes.iter_mut() {
        if rng.gen::<f64>() < mutation_rate {
            *gene = (*gene + gaussian(rng) * sigma).clamp(0.0, 1.0);
            mutated = true;
        }
    }
    if mutated {
        individual.evaluated = false;
        individual.fitness = f64::NEG_INFINITY;
    }
    mutated
}

pub fn genetic_algorithm<P, R>(
    evaluator: &mut Evaluator<'_>,
    physics: &mut P,
    wafer: &P::Wafer,
    config: &OptimizationConfig,
    rng: &mut R,
) -> SearchOutcome
where
    P: PhysicsEvaluator,
    P::Wafer: Clone,
    R: Rng,
{
    let gene_count = evaluator.target().active_count();
    let mut population = GaPopulation::random(config.population_size, gene_count, rng);
    let mut evaluations = Vec::new();
    let mut history = Vec::new();
    let mut global_best = f64::NEG_INFINITY;
    let mut stagnation = 0;
    let mut has_converged = false;
    let mut stop_reason = StopReason::MaxGenerations;

    tracing::info!(
        category = "optimization",
        target = %evaluator.target().name,
        population = config.population_size,
        genes = gene_count,
        max_generations = config.max_generations,
        "Genetic algorithm started"
    );

    for generation in 0..config.max_generations {
        population.generation = generation;

        for individual in population.individuals.iter_mut().filter(|i| !i.evaluated) {
            let parameters = evaluator.decode_parameters(&individual.genes);
            let evaluation = evaluator.evaluate(physics, wafer, parameters);
            individual.fitness = evaluation.fitness;
            individual.evaluated = true;
            evaluations.push(evaluation);
        }

        population.update_statistics();
        if population.best_fitness > global_best {
            global_best = population.best_fitness;
            stagnation = 0;
        } else {
            stagnation += 1;
        }

        history.push(GenerationStats {
            generation,
            best_fitness: population.best_fitness,
            average_fitness: population.average_fitness,
            evaluations: evaluations.len(),
        });
        tracing::debug!(
            category = "optimization",
            generation,
            best = population.best_fitness,
            average = population.average_fitness,
            stagnation,
            "Generation evaluated"
        );

        if stagnation >= config.stagnation_limit {
            has_converged = true;
            stop_reason = StopReason::Stagnation;
            tracing::info!(category = "optimization", generation, "Fitness stagnated; stopping early");
            break;
        }
        if generation + 1 == config.max_generations {
            break;
        }

        let pool = select(&population.individuals, config, rng);
        let mut offspring = crossover(&pool, config.crossover_rate, rng);
        for individual in offspring.iter_mut() {
            mutate(individual, config.mutation_rate, config.mutation_sigma, rng);
        }
        population.individuals = offspring;
    }

    SearchOutcome {
        evaluations,
        has_converged,
        stop_reason,
        generations: history.len(),
        history,
    }
}
