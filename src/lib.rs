pub mod api;
pub mod commands;
pub mod config;
pub mod database;
pub mod food;
pub mod providers;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use config::Config;
pub use food::analysis::{AnalysisCoordinator, AnalysisEngine, AnalysisError};
pub use state::AppState;
