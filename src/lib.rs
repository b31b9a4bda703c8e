pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::cli::LocalStorage;
pub use config::toml_config::TomlConfig;
pub use core::{engine::ChangeEngine, ChangePipeline};
pub use utils::error::{InferenceError, Result};
