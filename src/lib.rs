pub mod cli;
pub mod config;
pub mod element_finder;
pub mod event_log;
pub mod models;
pub mod plugins;
pub mod product_manager;
pub mod scheduler;
pub mod scraper;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use product_manager::ProductManager;
pub use scheduler::ProductScheduler;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
