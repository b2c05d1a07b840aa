//! Recipe execution and process parameter optimization for fabrication steps.
//!
//! Physics lives behind [`physics::PhysicsEvaluator`]; this crate sequences
//! steps against it and searches its parameter space.

pub mod config;
pub mod error;
pub mod logger;
pub mod optimization;
pub mod physics;
pub mod scheduler;
pub mod services;

pub use config::FabforgeConfig;
pub use error::{FabforgeError, FabforgeResult};
pub use optimization::OptimizationController;
pub use physics::{PhysicsEvaluator, PhysicsOutcome};
pub use scheduler::{RecipeExecutor, RecipeExecutorBuilder};
pub use services::Services;
