//! Application configuration loading and validation (snipe.toml).

pub mod config;
pub mod paths;
pub mod validate;

pub use config::{
    AppConfig, BrowserConfig, CloudConfig, RegistrationConfig, StorageConfig, TargetEntry,
};
pub use paths::{config_file_path, state_dir};
pub use validate::{ConfigError, validate_config};
