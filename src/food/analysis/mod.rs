pub mod coordinator;
pub mod engine;
pub mod freshness;

pub use coordinator::{AnalysisCoordinator, AnalysisError, CoordinatorSettings};
pub use engine::AnalysisEngine;
pub use freshness::{is_fresh, Clock, FreshnessPolicy, SystemClock};
