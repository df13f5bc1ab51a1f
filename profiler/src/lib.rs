pub mod cli;
pub mod config;
pub mod services;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use utils::{AppError, AppResult};
