use crate::config::FabforgeConfig;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;

/// Shared collaborators handed to the scheduler and the optimizer.
///
/// Replaces process-wide singletons: whoever builds an engine decides which
/// configuration it sees.
#[derive(Debug, Clone, Default)]
pub struct Services {
    config: Arc<FabforgeConfig>,
}

impl Services {
    pub fn new(config: FabforgeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &FabforgeConfig {
        &self.config
    }

    /// Random source for stochastic searches, seeded when the config pins a seed.
    pub fn rng(&self) -> StdRng {
        match self.config.optimization.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
