//! Configuration system for Satchel.
//!
//! Provides TOML-based configuration with:
//! - A `[session]` section for storage directories and the compute override
//! - Config file layering (user config dir + project-local overrides)
//! - Environment variable overrides resolved at load time

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
