//! Recipe execution: validation, sequential flow control, thermal budget
//! tracking, single-shot recovery and cross-process parameter propagation.

pub mod builder;
pub mod context;
pub mod executor;
pub mod propagation;
pub mod recovery;
pub mod resolver;
pub mod thermal;

pub use builder::RecipeExecutorBuilder;
pub use context::{ExecutionContext, ExecutionEvent, RecipeExecutionResult, RecipeStatus, StepRecord};
pub use executor::{CancellationToken, RecipeExecutor};
pub use propagation::{CrossProcessDependency, Transform};
