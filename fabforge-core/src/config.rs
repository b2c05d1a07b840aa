use crate::error::{FabforgeError, FabforgeResult};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Static defaults for the scheduler and the optimizer.
///
/// Every field has a default, so a YAML file only needs the keys it changes:
///
/// ```yaml
/// scheduler:
///   default_thermal_budget_limit: 2.5e6
/// optimization:
///   population_size: 80
///   seed: 7
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabforgeConfig {
    pub scheduler: SchedulerConfig,
    pub optimization: OptimizationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Thermal budget in °C·s used when a recipe declares a non-positive limit.
    pub default_thermal_budget_limit: f64,
    pub default_step_timeout_secs: f64,
    /// Steps slower than the timeout are failed after the physics call returns.
    pub enforce_step_timeout: bool,
    /// Reject duplicate ids and prerequisites naming undeclared steps.
    pub strict_prerequisites: bool,
    /// Multiplier applied to every step parameter before the retry.
    pub retry_parameter_scale: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_thermal_budget_limit: 1.0e6,
            default_step_timeout_secs: 3600.0,
            enforce_step_timeout: true,
            strict_prerequisites: true,
            retry_parameter_scale: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub population_size: usize,
    pub max_generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub tournament_size: usize,
    pub use_tournament_selection: bool,
    pub stagnation_limit: usize,
    pub mutation_sigma: f64,
    /// Combinations sampled when three or more parameters are active.
    pub random_sweep_samples: usize,
    /// Grid divisions for a swept parameter declaring no step size.
    pub default_sweep_divisions: usize,
    /// Largest grid a one- or two-parameter sweep may evaluate.
    pub max_sweep_points: usize,
    /// Subtract the soft-constraint penalty from fitness.
    pub apply_constraint_penalty: bool,
    pub cost_weight: f64,
    pub seed: Option<u64>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            tournament_size: 3,
            use_tournament_selection: true,
            stagnation_limit: 20,
            mutation_sigma: 0.1,
            random_sweep_samples: 100,
            default_sweep_divisions: 10,
            max_sweep_points: 10_000,
            apply_constraint_penalty: false,
            cost_weight: 0.1,
            seed: None,
        }
    }
}

impl FabforgeConfig {
    /// Reads and validates a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> FabforgeResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| FabforgeError::FileIO(shown.clone(), e))?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| FabforgeError::YamlParsing(shown.clone(), e))?;
        config.validate()?;
        tracing::info!(category = "config", path = %shown, "Configuration loaded");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> FabforgeResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| FabforgeError::YamlParsing("<inline>".to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FabforgeResult<()> {
        let s = &self.scheduler;
        if !(s.default_thermal_budget_limit > 0.0) {
            return Err(FabforgeError::ConfigError(
                "scheduler.default_thermal_budget_limit must be positive".into(),
            ));
        }
        if !(s.retry_parameter_scale > 0.0) {
            return Err(FabforgeError::ConfigError(
                "scheduler.retry_parameter_scale must be positive".into(),
            ));
        }

        let o = &self.optimization;
        if o.population_size == 0 {
            return Err(FabforgeError::ConfigError(
                "optimization.population_size must be at least 1".into(),
            ));
        }
        for (name, rate) in [("mutation_rate", o.mutation_rate), ("crossover_rate", o.crossover_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(FabforgeError::ConfigError(format!(
                    "optimization.{} must lie in [0, 1], got {}",
                    name, rate
                )));
            }
        }
        if o.tournament_size == 0 {
            return Err(FabforgeError::ConfigError(
                "optimization.tournament_size must be at least 1".into(),
            ));
        }
        if o.max_sweep_points == 0 {
            return Err(FabforgeError::ConfigError(
                "optimization.max_sweep_points must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = FabforgeConfig::from_yaml_str(
            "optimization:\n  population_size: 12\n  seed: 42\n",
        )
        .unwrap();
        assert_eq!(config.optimization.population_size, 12);
        assert_eq!(config.optimization.seed, Some(42));
        assert_eq!(config.optimization.stagnation_limit, 20);
        assert_eq!(config.scheduler.retry_parameter_scale, 0.95);
        assert_eq!(config.optimization.max_sweep_points, 10_000);
    }

    #[test]
    fn rejects_out_of_range_rates() {
        let err = FabforgeConfig::from_yaml_str("optimization:\n  mutation_rate: 1.5\n").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn rejects_empty_sweep_limit() {
        let err = FabforgeConfig::from_yaml_str("optimization:\n  max_sweep_points: 0\n").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn load_reads_file_and_reports_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scheduler:\n  default_thermal_budget_limit: 5000.0").unwrap();
        let config = FabforgeConfig::load(file.path()).unwrap();
        assert_eq!(config.scheduler.default_thermal_budget_limit, 5000.0);

        let err = FabforgeConfig::load("/nonexistent/fabforge.yaml").unwrap_err();
        assert_eq!(err.code(), "FILE_IO");
    }
}
