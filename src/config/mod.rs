// Configuration management module
// TOML settings in the data directory, environment overrides and the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, DEVICE_ENV_VAR, Device, DocumentsConfig, GenerationConfig, OllamaConfig,
    RetrievalConfig,
};

/// Default data directory, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "./data";
