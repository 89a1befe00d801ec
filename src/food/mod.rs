pub mod analysis;
pub mod api;
pub mod config;
pub mod models;
pub mod service;

pub use service::{LookupError, ProductService};
