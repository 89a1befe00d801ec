pub mod database;
pub mod traits;

pub use database::Database;
pub use database::DatabaseError;
pub use traits::{AnalysisOrder, ProductQuery, ProductStore};
