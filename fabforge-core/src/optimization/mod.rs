//! Parameter optimization: sweep and genetic-algorithm search against the
//! physics collaborator.

pub mod analysis;
pub mod controller;
pub mod evaluator;
pub mod genetic;
pub mod sweep;

use fabforge_schemas::optimization::{Evaluation, GenerationStats, StopReason};

pub use controller::OptimizationController;
pub use evaluator::{default_objectives, Evaluator};

/// What a search strategy hands back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub evaluations: Vec<Evaluation>,
    pub has_converged: bool,
    pub stop_reason: StopReason,
    pub generations: usize,
    pub history: Vec<GenerationStats>,
}
