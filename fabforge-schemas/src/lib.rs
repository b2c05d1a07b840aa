pub mod optimization;
pub mod recipe;
pub mod step;
