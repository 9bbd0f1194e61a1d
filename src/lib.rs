//! ENM-protein ML - подготовка данных о связывании белков с наночастицами и регрессия

pub mod config;
pub mod database;
pub mod error;
pub mod loader;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod types;

pub use types::*;
pub use models::*;
pub use preprocessing::*;

// Re-export для удобства
pub use config::{DatasetSchema, PipelineConfig};
pub use database::Database;
pub use error::{DataError, ModelError};
pub use report::{save_metrics, RunSummary};
