pub mod alert_state;
pub mod catalog;
pub mod config;
pub mod extractor;
pub mod models;
pub mod plugins;
pub mod product_manager;
pub mod scheduler;
pub mod scraper;
pub mod utils;

// Re-export commonly used types
pub use alert_state::{AlertAction, AlertState};
pub use config::AppConfig;
pub use extractor::Extractor;
pub use product_manager::{CycleReport, ProductManager};
pub use scheduler::{ProductScheduler, Shutdown, ShutdownHandle};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
