pub mod api;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod providers;
pub mod report;

// Re-export commonly used items
pub use api::{create_api, ApiLimits, AppState, Services};
pub use config::AppConfig;
pub use error::{Result, RfpError};
