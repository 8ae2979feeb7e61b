pub mod config;
pub mod dispatcher;
pub mod extractor;
pub mod logging;
pub mod models;
pub mod plugins;
pub mod registry;
pub mod scheduler;
pub mod scraper;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::{AppError, Result};
