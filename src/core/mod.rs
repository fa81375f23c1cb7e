pub mod config;
pub mod error;

pub use config::GeneratorConfig;
pub use error::{Result, SaveGenError};
