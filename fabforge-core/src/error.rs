use thiserror::Error;

pub type FabforgeResult<T> = Result<T, FabforgeError>;

#[derive(Debug, Error)]
pub enum FabforgeError {
    #[error("Recipe '{0}' has no steps")]
    EmptyRecipe(String),

    #[error("Recipe '{0}' contains a step with an empty id")]
    EmptyStepId(String),

    #[error("Step '{0}' has no process type")]
    MissingProcessType(String),

    #[error("Step '{step_id}' has non-positive estimated time {estimated_time}")]
    NonPositiveEstimatedTime { step_id: String, estimated_time: f64 },

    #[error("Step id '{0}' is declared more than once")]
    DuplicateStepId(String),

    #[error("Step '{step_id}' requires undeclared step '{prerequisite}'")]
    UnknownPrerequisite { step_id: String, prerequisite: String },

    #[error("Cyclic dependency detected at step '{0}'")]
    CyclicDependency(String),

    #[error("Recipe '{0}' not found")]
    RecipeNotFound(String),

    #[error("Execution '{0}' not found")]
    ExecutionNotFound(String),

    #[error("Optimization target '{0}' has no active parameters")]
    NoActiveParameters(String),

    #[error("Parameter '{name}' has invalid range [{min}, {max}]")]
    InvalidParameterRange { name: String, min: f64, max: f64 },

    #[error("Parameter sweep over '{scope}' needs {points:.0} grid points, more than the limit of {limit}")]
    SweepTooLarge { scope: String, points: f64, limit: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error for file '{0}': {1}")]
    FileIO(String, #[source] std::io::Error),

    #[error("Failed to parse YAML from '{0}': {1}")]
    YamlParsing(String, #[source] serde_yaml::Error),

    #[error("Failed to encode JSON: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("CSV error for step trace '{0}': {1}")]
    CsvError(String, #[source] csv::Error),
}

impl FabforgeError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            FabforgeError::EmptyRecipe(_) => "EMPTY_RECIPE",
            FabforgeError::EmptyStepId(_) => "EMPTY_STEP_ID",
            FabforgeError::MissingProcessType(_) => "MISSING_PROCESS_TYPE",
            FabforgeError::NonPositiveEstimatedTime { .. } => "NON_POSITIVE_ESTIMATED_TIME",
            FabforgeError::DuplicateStepId(_) => "DUPLICATE_STEP_ID",
            FabforgeError::UnknownPrerequisite { .. } => "UNKNOWN_PREREQUISITE",
            FabforgeError::CyclicDependency(_) => "CYCLIC_DEPENDENCY",
            FabforgeError::RecipeNotFound(_) => "RECIPE_NOT_FOUND",
            FabforgeError::ExecutionNotFound(_) => "EXECUTION_NOT_FOUND",
            FabforgeError::NoActiveParameters(_) => "NO_ACTIVE_PARAMETERS",
            FabforgeError::InvalidParameterRange { .. } => "INVALID_PARAMETER_RANGE",
            FabforgeError::SweepTooLarge { .. } => "SWEEP_TOO_LARGE",
            FabforgeError::ConfigError(_) => "CONFIG_ERROR",
            FabforgeError::FileIO(..) => "FILE_IO",
            FabforgeError::YamlParsing(..) => "YAML_PARSING",
            FabforgeError::JsonParsing(_) => "JSON_PARSING",
            FabforgeError::CsvError(..) => "CSV_ERROR",
        }
    }

    /// True for malformed-recipe errors reported by validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FabforgeError::EmptyRecipe(_)
                | FabforgeError::EmptyStepId(_)
                | FabforgeError::MissingProcessType(_)
                | FabforgeError::NonPositiveEstimatedTime { .. }
                | FabforgeError::DuplicateStepId(_)
                | FabforgeError::UnknownPrerequisite { .. }
                | FabforgeError::CyclicDependency(_)
        )
    }
}
