pub mod app_config;
pub mod export;
pub mod logging;
pub mod manager;

pub use app_config::*;
pub use export::*;
pub use logging::*;
pub use manager::*;
