//! Configuration module for the schema control engine.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `control.yml`
//! - Validation of configuration values
//! - Content hashing of change scripts and definition sets

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{ConnectionSpec, ControlConfig, ControlFile, DEFAULT_PARALLELISM, DEFAULT_SCHEMA};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_DIALECT, ENV_PARALLELISM, ENV_SCHEMA, ENV_STRICT, find_config_file,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::ContentHasher;
