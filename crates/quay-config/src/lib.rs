//! Configuration system for Quay.
//!
//! Provides TOML-based configuration with:
//! - `[server]` listener settings
//! - `[session]` engine settings (TTL, cookie attributes, derivation salt)
//! - `[logging]` output settings
//! - Config file layering (user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigLayer, ConfigSource, LoadedConfig, load_config, load_config_file,
    load_config_with_options, save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
