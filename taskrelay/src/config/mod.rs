//! Configuration module for the relay engine
//!
//! Configuration is an explicit value built once (usually from a TOML file) and handed to
//! each component at construction time.

pub mod loader;
pub mod types;

pub use loader::load_config;
pub use types::*;
